//! Officer seats per affiliate: who holds each primary/secondary seat now,
//! who held it before, and the officer role grant that follows incumbency.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::access::ROLE_OFFICER;
use crate::audit::{self, AuditEvent, SUBJECT_OFFICER};
use crate::error::{AppError, AppResult};
use crate::models::{Affiliate, AffiliateOfficer, Member, NewAffiliateOfficer, NewRoleGrant, OfficerPosition};
use crate::schema::{affiliate_officers, members, officer_positions, role_grants, roles};

pub const PREVIOUS_OFFICERS_SHOWN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Primary,
    Secondary,
}

impl Slot {
    pub fn is_primary(self) -> bool {
        self == Slot::Primary
    }

    pub fn from_is_primary(is_primary: bool) -> Self {
        if is_primary {
            Slot::Primary
        } else {
            Slot::Secondary
        }
    }

    fn label(self) -> &'static str {
        match self {
            Slot::Primary => "primary",
            Slot::Secondary => "secondary",
        }
    }
}

pub fn find_position(conn: &mut PgConnection, position_id: i64) -> AppResult<OfficerPosition> {
    officer_positions::table
        .find(position_id)
        .first::<OfficerPosition>(conn)
        .optional()?
        .ok_or_else(|| AppError::invalid_field("position_id", "position does not exist"))
}

pub fn find_member(conn: &mut PgConnection, public_id: Uuid) -> AppResult<Member> {
    members::table
        .filter(members::public_id.eq(public_id))
        .first::<Member>(conn)
        .optional()?
        .ok_or_else(|| AppError::invalid_field("member_id", "member does not exist"))
}

fn describe(member: &Member, position: &OfficerPosition, slot: Slot, affiliate: &Affiliate) -> String {
    format!(
        "{} as {} ({}) of {}",
        member.full_name(),
        position.name,
        slot.label(),
        affiliate.name
    )
}

/// Hands the seat over to `member`, closing the current incumbent and any
/// vacancy marker, and keeps both members' officer role in step. Returns
/// the refreshed listing.
#[allow(clippy::too_many_arguments)]
pub fn assign(
    conn: &mut PgConnection,
    affiliate: &Affiliate,
    member: &Member,
    position: &OfficerPosition,
    slot: Slot,
    start_date: Option<NaiveDate>,
    today: NaiveDate,
    actor_id: Uuid,
) -> AppResult<Vec<PositionListing>> {
    if member.affiliate_id != affiliate.id {
        return Err(AppError::invalid_field(
            "member_id",
            "member does not belong to this affiliate",
        ));
    }
    if slot == Slot::Secondary && !position.has_secondary {
        return Err(AppError::invalid_field(
            "slot",
            format!("{} has no secondary seat", position.name),
        ));
    }
    let start_date = start_date.unwrap_or(today);

    conn.transaction::<_, AppError, _>(|conn| {
        let current: Option<AffiliateOfficer> = affiliate_officers::table
            .filter(affiliate_officers::affiliate_id.eq(affiliate.id))
            .filter(affiliate_officers::position_id.eq(position.id))
            .filter(affiliate_officers::is_primary.eq(slot.is_primary()))
            .filter(affiliate_officers::end_date.is_null())
            .filter(affiliate_officers::is_vacant.eq(false))
            .for_update()
            .first(conn)
            .optional()?;

        if let Some(current) = &current {
            if current.member_id == Some(member.id) {
                return Err(AppError::conflict("member already holds this seat"));
            }
            close_record(conn, current.id, today)?;
        }

        let vacancies_closed = diesel::update(
            affiliate_officers::table
                .filter(affiliate_officers::affiliate_id.eq(affiliate.id))
                .filter(affiliate_officers::position_id.eq(position.id))
                .filter(affiliate_officers::is_primary.eq(slot.is_primary()))
                .filter(affiliate_officers::end_date.is_null())
                .filter(affiliate_officers::is_vacant.eq(true)),
        )
        .set((
            affiliate_officers::end_date.eq(Some(today)),
            affiliate_officers::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

        let mut replaced: Option<String> = None;
        if let Some(current) = &current {
            if let Some(previous_id) = current.member_id {
                let previous: Member = members::table.find(previous_id).first(conn)?;
                replaced = Some(previous.full_name());
                revoke_officer_role_if_idle(conn, &previous)?;
                audit::record(
                    conn,
                    Some(actor_id),
                    AuditEvent::new(
                        "officer.removed",
                        SUBJECT_OFFICER,
                        current.id,
                        describe(&previous, position, slot, affiliate),
                    )
                    .with_old(json!({
                        "member": previous.full_name(),
                        "position": position.name,
                        "slot": slot,
                        "affiliate": affiliate.name,
                    }))
                    .with_new(json!({ "end_date": today })),
                )?;
            }
        }

        let record: AffiliateOfficer = diesel::insert_into(affiliate_officers::table)
            .values(&NewAffiliateOfficer {
                affiliate_id: affiliate.id,
                position_id: position.id,
                member_id: Some(member.id),
                start_date,
                is_vacant: false,
                is_primary: slot.is_primary(),
            })
            .get_result(conn)?;

        grant_officer_role(conn, member)?;

        audit::record(
            conn,
            Some(actor_id),
            AuditEvent::new(
                "officer.assigned",
                SUBJECT_OFFICER,
                record.id,
                describe(member, position, slot, affiliate),
            )
            .with_old(json!({ "member": replaced }))
            .with_new(json!({
                "member": member.full_name(),
                "position": position.name,
                "slot": slot,
                "affiliate": affiliate.name,
                "start_date": start_date,
            })),
        )?;

        tracing::info!(
            affiliate_id = affiliate.id,
            position_id = position.id,
            member_id = member.id,
            slot = slot.label(),
            replaced = replaced.is_some(),
            vacancies_closed,
            "assigned officer"
        );
        Ok(())
    })?;

    listing(conn, affiliate.id)
}

/// Closes an active incumbency and marks the seat vacant.
pub fn vacate(
    conn: &mut PgConnection,
    affiliate: &Affiliate,
    record_id: i64,
    today: NaiveDate,
    actor_id: Uuid,
) -> AppResult<Vec<PositionListing>> {
    conn.transaction::<_, AppError, _>(|conn| {
        let record: AffiliateOfficer = affiliate_officers::table
            .find(record_id)
            .filter(affiliate_officers::affiliate_id.eq(affiliate.id))
            .for_update()
            .first(conn)?;

        let Some(member_id) = record.member_id.filter(|_| record.end_date.is_none()) else {
            return Err(AppError::conflict("this seat is not currently held"));
        };

        close_record(conn, record.id, today)?;
        diesel::insert_into(affiliate_officers::table)
            .values(&NewAffiliateOfficer {
                affiliate_id: affiliate.id,
                position_id: record.position_id,
                member_id: None,
                start_date: today,
                is_vacant: true,
                is_primary: record.is_primary,
            })
            .execute(conn)?;

        let member: Member = members::table.find(member_id).first(conn)?;
        let position: OfficerPosition = officer_positions::table.find(record.position_id).first(conn)?;
        let slot = Slot::from_is_primary(record.is_primary);
        let revoked = revoke_officer_role_if_idle(conn, &member)?;

        audit::record(
            conn,
            Some(actor_id),
            AuditEvent::new(
                "officer.vacated",
                SUBJECT_OFFICER,
                record.id,
                describe(&member, &position, slot, affiliate),
            )
            .with_old(json!({
                "member": member.full_name(),
                "position": position.name,
                "slot": slot,
                "start_date": record.start_date,
            }))
            .with_new(json!({ "end_date": today, "vacant": true })),
        )?;

        tracing::info!(
            affiliate_id = affiliate.id,
            position_id = position.id,
            member_id,
            role_revoked = revoked,
            "vacated officer seat"
        );
        Ok(())
    })?;

    listing(conn, affiliate.id)
}

fn close_record(conn: &mut PgConnection, record_id: i64, today: NaiveDate) -> AppResult<()> {
    diesel::update(affiliate_officers::table.find(record_id))
        .set((
            affiliate_officers::end_date.eq(Some(today)),
            affiliate_officers::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

fn officer_role_id(conn: &mut PgConnection) -> AppResult<i32> {
    roles::table
        .filter(roles::name.eq(ROLE_OFFICER))
        .select(roles::id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::internal("officer role is not seeded"))
}

/// Whether the login still holds any seat, across every member record
/// linked to it.
fn holds_any_seat(conn: &mut PgConnection, user_id: Uuid) -> AppResult<bool> {
    let held = diesel::select(exists(
        affiliate_officers::table
            .inner_join(members::table)
            .filter(members::user_id.eq(user_id))
            .filter(affiliate_officers::end_date.is_null())
            .filter(affiliate_officers::is_vacant.eq(false)),
    ))
    .get_result(conn)?;
    Ok(held)
}

fn grant_officer_role(conn: &mut PgConnection, member: &Member) -> AppResult<()> {
    let Some(user_id) = member.user_id else {
        tracing::debug!(member_id = member.id, "member has no login; skipping role grant");
        return Ok(());
    };
    let role_id = officer_role_id(conn)?;
    diesel::insert_into(role_grants::table)
        .values(&NewRoleGrant { user_id, role_id })
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(())
}

/// Returns whether a grant was removed.
fn revoke_officer_role_if_idle(conn: &mut PgConnection, member: &Member) -> AppResult<bool> {
    let Some(user_id) = member.user_id else {
        tracing::debug!(member_id = member.id, "member has no login; skipping role revoke");
        return Ok(false);
    };
    if holds_any_seat(conn, user_id)? {
        return Ok(false);
    }
    let role_id = officer_role_id(conn)?;
    let removed = diesel::delete(
        role_grants::table
            .filter(role_grants::user_id.eq(user_id))
            .filter(role_grants::role_id.eq(role_id)),
    )
    .execute(conn)?;
    Ok(removed > 0)
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionInfo {
    pub id: i64,
    pub name: String,
    pub display_order: i32,
    pub has_secondary: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Incumbent {
    pub record_id: i64,
    pub member_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub other_positions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PastIncumbent {
    pub record_id: i64,
    pub member_id: Uuid,
    pub name: String,
    pub slot: Slot,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionListing {
    pub position: PositionInfo,
    pub primary: Option<Incumbent>,
    pub secondary: Option<Incumbent>,
    pub primary_vacant_since: Option<NaiveDate>,
    pub secondary_vacant_since: Option<NaiveDate>,
    pub previous: Vec<PastIncumbent>,
}

pub fn listing(conn: &mut PgConnection, affiliate_id: i64) -> AppResult<Vec<PositionListing>> {
    let positions: Vec<OfficerPosition> = officer_positions::table
        .order((officer_positions::display_order.asc(), officer_positions::id.asc()))
        .load(conn)?;
    let records: Vec<AffiliateOfficer> = affiliate_officers::table
        .filter(affiliate_officers::affiliate_id.eq(affiliate_id))
        .load(conn)?;
    let member_ids: Vec<i64> = records.iter().filter_map(|record| record.member_id).collect();
    let members: HashMap<i64, Member> = members::table
        .filter(members::id.eq_any(member_ids))
        .load::<Member>(conn)?
        .into_iter()
        .map(|member| (member.id, member))
        .collect();

    Ok(build_listing(&positions, &records, &members))
}

pub fn build_listing(
    positions: &[OfficerPosition],
    records: &[AffiliateOfficer],
    members: &HashMap<i64, Member>,
) -> Vec<PositionListing> {
    let position_names: HashMap<i64, (i32, &str)> = positions
        .iter()
        .map(|position| (position.id, (position.display_order, position.name.as_str())))
        .collect();
    let active: Vec<&AffiliateOfficer> = records
        .iter()
        .filter(|record| record.end_date.is_none() && !record.is_vacant)
        .collect();

    let incumbent = |record: &AffiliateOfficer| -> Option<Incumbent> {
        let member = members.get(&record.member_id?)?;
        let mut others: Vec<(i32, &str)> = active
            .iter()
            .filter(|other| other.member_id == Some(member.id) && other.id != record.id)
            .filter_map(|other| position_names.get(&other.position_id).copied())
            .collect();
        others.sort();
        Some(Incumbent {
            record_id: record.id,
            member_id: member.public_id,
            name: member.full_name(),
            start_date: record.start_date,
            other_positions: others.into_iter().map(|(_, name)| name.to_string()).collect(),
        })
    };

    positions
        .iter()
        .map(|position| {
            let seat = |slot: Slot| {
                active
                    .iter()
                    .find(|record| {
                        record.position_id == position.id && record.is_primary == slot.is_primary()
                    })
                    .and_then(|record| incumbent(record))
            };
            let vacant_since = |slot: Slot| {
                records
                    .iter()
                    .find(|record| {
                        record.position_id == position.id
                            && record.is_primary == slot.is_primary()
                            && record.is_vacant
                            && record.end_date.is_none()
                    })
                    .map(|record| record.start_date)
            };

            let mut closed: Vec<&AffiliateOfficer> = records
                .iter()
                .filter(|record| {
                    record.position_id == position.id && !record.is_vacant && record.end_date.is_some()
                })
                .collect();
            closed.sort_by(|a, b| b.end_date.cmp(&a.end_date).then(b.id.cmp(&a.id)));
            let previous = closed
                .into_iter()
                .filter_map(|record| {
                    let member = members.get(&record.member_id?)?;
                    Some(PastIncumbent {
                        record_id: record.id,
                        member_id: member.public_id,
                        name: member.full_name(),
                        slot: Slot::from_is_primary(record.is_primary),
                        start_date: record.start_date,
                        end_date: record.end_date?,
                    })
                })
                .take(PREVIOUS_OFFICERS_SHOWN)
                .collect();

            PositionListing {
                position: PositionInfo {
                    id: position.id,
                    name: position.name.clone(),
                    display_order: position.display_order,
                    has_secondary: position.has_secondary,
                },
                primary: seat(Slot::Primary),
                secondary: if position.has_secondary {
                    seat(Slot::Secondary)
                } else {
                    None
                },
                primary_vacant_since: vacant_since(Slot::Primary),
                secondary_vacant_since: vacant_since(Slot::Secondary),
                previous,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct EligibleMember {
    pub member_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub holds_position: bool,
    pub positions: Option<String>,
}

/// Every member of the affiliate with the seats they currently hold.
/// Holding a seat does not make a member ineligible.
pub fn eligible_members(conn: &mut PgConnection, affiliate_id: i64) -> AppResult<Vec<EligibleMember>> {
    let roster: Vec<Member> = members::table
        .filter(members::affiliate_id.eq(affiliate_id))
        .order((members::last_name.asc(), members::first_name.asc(), members::id.asc()))
        .load(conn)?;

    let held: Vec<(Option<i64>, String)> = affiliate_officers::table
        .inner_join(officer_positions::table)
        .filter(affiliate_officers::affiliate_id.eq(affiliate_id))
        .filter(affiliate_officers::end_date.is_null())
        .filter(affiliate_officers::is_vacant.eq(false))
        .order((officer_positions::display_order.asc(), affiliate_officers::id.asc()))
        .select((affiliate_officers::member_id, officer_positions::name))
        .load(conn)?;

    let mut by_member: HashMap<i64, Vec<String>> = HashMap::new();
    for (member_id, name) in held {
        if let Some(member_id) = member_id {
            by_member.entry(member_id).or_default().push(name);
        }
    }

    Ok(roster
        .into_iter()
        .map(|member| {
            let positions = by_member.remove(&member.id).map(|names| names.join(", "));
            EligibleMember {
                member_id: member.public_id,
                name: member.full_name(),
                email: member.email.clone(),
                holds_position: positions.is_some(),
                positions,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).expect("date")
    }

    fn position(id: i64, name: &str, order: i32, has_secondary: bool) -> OfficerPosition {
        OfficerPosition {
            id,
            name: name.into(),
            display_order: order,
            has_secondary,
            created_at: NaiveDateTime::default(),
        }
    }

    fn member(id: i64, first: &str, last: &str) -> Member {
        Member {
            id,
            public_id: Uuid::new_v4(),
            affiliate_id: 1,
            user_id: None,
            first_name: first.into(),
            last_name: last.into(),
            email: None,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }

    fn record(
        id: i64,
        position_id: i64,
        member_id: Option<i64>,
        start: u32,
        end: Option<u32>,
        is_primary: bool,
    ) -> AffiliateOfficer {
        AffiliateOfficer {
            id,
            affiliate_id: 1,
            position_id,
            member_id,
            start_date: date(start),
            end_date: end.map(date),
            is_vacant: member_id.is_none(),
            is_primary,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn listing_groups_seats_and_history() {
        let positions = vec![
            position(2, "Vice President", 2, true),
            position(1, "President", 1, false),
        ];
        let members: HashMap<i64, Member> = [
            member(10, "Ada", "Lovelace"),
            member(11, "Grace", "Hopper"),
            member(12, "Alan", "Turing"),
            member(13, "Edsger", "Dijkstra"),
        ]
        .into_iter()
        .map(|m| (m.id, m))
        .collect();
        let records = vec![
            record(1, 1, Some(11), 1, Some(5), true),
            record(2, 1, Some(12), 5, Some(9), true),
            record(3, 1, Some(13), 9, Some(9), true),
            record(4, 1, Some(11), 9, Some(12), true),
            record(5, 1, Some(10), 12, None, true),
            record(6, 2, Some(10), 3, None, false),
            record(7, 2, None, 4, None, true),
        ];

        let listing = build_listing(&positions, &records, &members);

        let president = listing
            .iter()
            .find(|entry| entry.position.id == 1)
            .expect("president");
        let holder = president.primary.as_ref().expect("incumbent");
        assert_eq!(holder.name, "Ada Lovelace");
        assert_eq!(holder.other_positions, vec!["Vice President".to_string()]);
        let previous: Vec<i64> = president.previous.iter().map(|p| p.record_id).collect();
        assert_eq!(previous, vec![4, 3, 2]);

        let vice = listing
            .iter()
            .find(|entry| entry.position.id == 2)
            .expect("vice president");
        assert!(vice.primary.is_none());
        assert_eq!(vice.primary_vacant_since, Some(date(4)));
        assert_eq!(
            vice.secondary.as_ref().map(|i| i.other_positions.clone()),
            Some(vec!["President".to_string()])
        );
    }

    #[test]
    fn slot_round_trips_through_flag() {
        assert_eq!(Slot::from_is_primary(true), Slot::Primary);
        assert!(!Slot::Secondary.is_primary());
    }
}
