mod common;

use affiliate_backend::access::{ROLE_MEMBER, ROLE_NATIONAL, ROLE_OFFICER};
use affiliate_backend::schema::{activity_log, documents};
use anyhow::Result;
use axum::http::Method;
use chrono::{Duration, Utc};
use common::{acquire_db_lock, TestApp};
use diesel::prelude::*;
use serde_json::{json, Value};

fn contract_metadata(expiration: chrono::NaiveDate) -> Value {
    json!({
        "title": "Master Agreement",
        "type": "contract",
        "category_group": "governance",
        "database_source": "contracts",
        "status": "active",
        "effective_date": "2022-01-01",
        "expiration_date": expiration,
        "employer": "Acme Transit",
    })
}

#[tokio::test]
async fn upload_rejects_disallowed_files_and_mixed_type_fields() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let local = app.insert_affiliate("Local 9").await?;
    let (_, token) = app
        .insert_user("steward", Some(local.affiliate_id), &[ROLE_OFFICER])
        .await?;

    let metadata = json!({"title": "Payload", "type": "general", "category_group": "research"});
    let (status, body) = app
        .multipart(
            Method::POST,
            "/api/documents",
            Some(("payload.exe", "application/octet-stream", &b"MZ"[..])),
            Some(&metadata),
            &token,
        )
        .await?;
    assert_eq!(status, 422);
    assert!(body["fields"]["file"].is_array(), "{body}");

    let oversized = vec![b'a'; 1024 * 1024 + 1];
    let (status, _) = app
        .multipart(
            Method::POST,
            "/api/documents",
            Some(("big.txt", "text/plain", oversized.as_slice())),
            Some(&metadata),
            &token,
        )
        .await?;
    assert!(status == 422 || status == 413, "unexpected status {status}");

    let mixed = json!({
        "title": "Award",
        "type": "arbitration",
        "category_group": "governance",
        "award_date": "2024-03-01",
        "arbitrator": "J. Smith",
        "outcome": "sustained",
        "status": "active",
    });
    let (status, body) = app
        .multipart(
            Method::POST,
            "/api/documents",
            Some(("award.txt", "text/plain", &b"award"[..])),
            Some(&mixed),
            &token,
        )
        .await?;
    assert_eq!(status, 422);
    assert!(body["fields"]["status"].is_array(), "{body}");
    assert_eq!(app.storage().object_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn archive_flag_is_dropped_outside_the_contracts_repository() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let local = app.insert_affiliate("Local 5").await?;
    let (_, token) = app
        .insert_user("treasurer", Some(local.affiliate_id), &[ROLE_OFFICER])
        .await?;

    let bylaws = app
        .upload(
            "bylaws.pdf",
            b"bylaws text",
            json!({
                "title": "Bylaws",
                "type": "bylaws",
                "category_group": "governance",
                "database_source": "general",
                "is_archived": true,
            }),
            &token,
        )
        .await?;
    assert_eq!(bylaws["is_archived"], false);

    let mut contract = contract_metadata(Utc::now().date_naive() + Duration::days(365));
    contract["is_archived"] = json!(true);
    let contract = app.upload("cba.pdf", b"contract text", contract, &token).await?;
    assert_eq!(contract["is_archived"], true);
    assert_eq!(contract["has_extracted_text"], true);
    Ok(())
}

#[tokio::test]
async fn expired_contracts_flip_after_status_refresh() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let local = app.insert_affiliate("Local 44").await?;
    let (_, officer) = app
        .insert_user("officer", Some(local.affiliate_id), &[ROLE_OFFICER])
        .await?;
    let (_, national) = app.insert_user("national", None, &[ROLE_NATIONAL]).await?;

    let tomorrow = Utc::now().date_naive() + Duration::days(1);
    let uploaded = app
        .upload("cba.pdf", b"wages", contract_metadata(tomorrow), &officer)
        .await?;
    assert_eq!(uploaded["status"], "active");

    // Age the contract as if a day had passed since upload.
    let yesterday = Utc::now().date_naive() - Duration::days(1);
    app.with_conn(move |conn| {
        diesel::update(documents::table)
            .set(documents::expiration_date.eq(Some(yesterday)))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    let (status, _) = app
        .json(Method::POST, "/api/documents/statuses/refresh", &json!({}), Some(&officer))
        .await?;
    assert_eq!(status, 403);

    let (status, body) = app
        .json(Method::POST, "/api/documents/statuses/refresh", &json!({}), Some(&national))
        .await?;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["updated"], 1);

    let (_, body) = app
        .get(&format!("/api/documents/{}", uploaded["id"].as_str().unwrap_or_default()), Some(&officer))
        .await?;
    assert_eq!(body["status"], "expired");
    Ok(())
}

#[tokio::test]
async fn past_due_contracts_are_stored_as_expired() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let (_, national) = app.insert_user("national", None, &[ROLE_NATIONAL]).await?;

    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let uploaded = app
        .upload("old.pdf", b"old terms", contract_metadata(yesterday), &national)
        .await?;
    assert_eq!(uploaded["status"], "expired");
    assert!(uploaded["affiliate_id"].is_null());
    assert!(uploaded["folder_id"].is_null());
    Ok(())
}

#[tokio::test]
async fn tenant_callers_never_see_other_affiliates_private_documents() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let ours = app.insert_affiliate("Local 100").await?;
    let theirs = app.insert_affiliate("Local 200").await?;
    let (_, our_officer) = app
        .insert_user("ours", Some(ours.affiliate_id), &[ROLE_OFFICER])
        .await?;
    let (_, their_officer) = app
        .insert_user("theirs", Some(theirs.affiliate_id), &[ROLE_OFFICER])
        .await?;
    let (_, our_member) = app
        .insert_user("member", Some(ours.affiliate_id), &[ROLE_MEMBER])
        .await?;

    let private = app
        .upload(
            "grievance.pdf",
            b"overtime grievance",
            json!({"title": "Overtime grievance", "type": "general", "category_group": "research"}),
            &their_officer,
        )
        .await?;
    app.upload(
        "shared.pdf",
        b"overtime survey",
        json!({"title": "Overtime survey", "type": "research", "category_group": "research", "is_public": true}),
        &their_officer,
    )
    .await?;
    app.upload(
        "ours.pdf",
        b"overtime local notes",
        json!({"title": "Overtime notes", "type": "general", "category_group": "research"}),
        &our_officer,
    )
    .await?;

    for token in [&our_officer, &our_member] {
        let (status, body) = app.get("/api/documents?q=overtime", Some(token)).await?;
        assert_eq!(status, 200, "{body}");
        assert_eq!(body["total"], 2);
        let titles: Vec<&str> = body["documents"]
            .as_array()
            .map(|docs| docs.iter().filter_map(|d| d["title"].as_str()).collect())
            .unwrap_or_default();
        assert!(!titles.contains(&"Overtime grievance"), "{titles:?}");
    }

    let private_id = private["id"].as_str().unwrap_or_default();
    let (status, _) = app
        .get(&format!("/api/documents/{private_id}"), Some(&our_officer))
        .await?;
    assert_eq!(status, 404);
    let (status, _) = app
        .delete(&format!("/api/documents/{private_id}"), Some(&our_officer))
        .await?;
    assert_eq!(status, 404);
    Ok(())
}

#[tokio::test]
async fn update_replaces_file_and_delete_removes_blob_and_row() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let local = app.insert_affiliate("Local 8").await?;
    let (_, token) = app
        .insert_user("editor", Some(local.affiliate_id), &[ROLE_OFFICER])
        .await?;

    let uploaded = app
        .upload(
            "minutes.pdf",
            b"first draft",
            json!({"title": "Minutes", "type": "general", "category_group": "governance", "employer": "Acme"}),
            &token,
        )
        .await?;
    let id = uploaded["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = app
        .get(&format!("/api/affiliates/{}/employers", local.affiliate_public_id), Some(&token))
        .await?;
    assert_eq!(status, 200);
    assert_eq!(body["employers"], json!(["Acme"]));

    let (status, body) = app
        .multipart(
            Method::PATCH,
            &format!("/api/documents/{id}"),
            Some(("minutes-v2.txt", "text/plain", &b"second draft"[..])),
            Some(&json!({"title": "Approved minutes", "employer": "Globex", "affiliate_id": null})),
            &token,
        )
        .await?;
    assert_eq!(status, 422, "owner change must be rejected: {body}");
    assert_eq!(app.storage().object_count().await, 1);

    let (status, body) = app
        .multipart(
            Method::PATCH,
            &format!("/api/documents/{id}"),
            Some(("minutes-v2.txt", "text/plain", &b"second draft"[..])),
            Some(&json!({"title": "Approved minutes", "employer": "Globex"})),
            &token,
        )
        .await?;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["title"], "Approved minutes");
    assert_eq!(body["original_filename"], "minutes-v2.txt");
    assert_eq!(body["has_extracted_text"], false);
    assert_eq!(app.storage().object_count().await, 1);

    let (_, body) = app
        .get(&format!("/api/affiliates/{}/employers", local.affiliate_public_id), Some(&token))
        .await?;
    assert_eq!(body["employers"], json!(["Globex"]));

    let (status, body) = app
        .get(&format!("/api/documents/{id}/download"), Some(&token))
        .await?;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["filename"], "minutes-v2.txt");
    assert_eq!(body["expires_in"], 300);

    let (status, _) = app.delete(&format!("/api/documents/{id}"), Some(&token)).await?;
    assert_eq!(status, 204);
    assert_eq!(app.storage().object_count().await, 0);
    let (status, _) = app.get(&format!("/api/documents/{id}"), Some(&token)).await?;
    assert_eq!(status, 404);

    let actions: Vec<String> = app
        .with_conn(|conn| {
            Ok(activity_log::table
                .order(activity_log::id.asc())
                .select(activity_log::action)
                .load(conn)?)
        })
        .await?;
    assert_eq!(
        actions,
        vec!["document.created", "document.updated", "document.deleted"]
    );
    Ok(())
}

#[tokio::test]
async fn failed_blob_write_leaves_no_document_row() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let local = app.insert_affiliate("Local 61").await?;
    let (_, token) = app
        .insert_user("recorder", Some(local.affiliate_id), &[ROLE_OFFICER])
        .await?;

    app.storage().fail_puts(true);
    let (status, body) = app
        .multipart(
            Method::POST,
            "/api/documents",
            Some(("minutes.pdf", "application/pdf", &b"minutes"[..])),
            Some(&json!({"title": "Minutes", "type": "general", "category_group": "governance"})),
            &token,
        )
        .await?;
    assert_eq!(status, 502, "{body}");

    let (rows, entries): (i64, i64) = app
        .with_conn(|conn| {
            let rows = documents::table.count().get_result(conn)?;
            let entries = activity_log::table.count().get_result(conn)?;
            Ok((rows, entries))
        })
        .await?;
    assert_eq!(rows, 0);
    assert_eq!(entries, 0);
    assert_eq!(app.storage().object_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn failed_blob_deletes_do_not_block_row_changes() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let local = app.insert_affiliate("Local 62").await?;
    let (_, token) = app
        .insert_user("recorder", Some(local.affiliate_id), &[ROLE_OFFICER])
        .await?;

    let uploaded = app
        .upload(
            "minutes.pdf",
            b"draft",
            json!({"title": "Minutes", "type": "general", "category_group": "governance"}),
            &token,
        )
        .await?;
    let id = uploaded["id"].as_str().unwrap_or_default().to_string();

    app.storage().fail_deletes(true);
    let (status, body) = app
        .multipart(
            Method::PATCH,
            &format!("/api/documents/{id}"),
            Some(("minutes-final.pdf", "application/pdf", &b"final"[..])),
            Some(&json!({"title": "Final minutes"})),
            &token,
        )
        .await?;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["title"], "Final minutes");
    assert_eq!(body["original_filename"], "minutes-final.pdf");
    // The replaced blob could not be removed and is left behind.
    assert_eq!(app.storage().object_count().await, 2);

    let (status, _) = app.delete(&format!("/api/documents/{id}"), Some(&token)).await?;
    assert_eq!(status, 204);
    let (status, _) = app.get(&format!("/api/documents/{id}"), Some(&token)).await?;
    assert_eq!(status, 404);
    assert_eq!(app.storage().object_count().await, 2);
    Ok(())
}

#[tokio::test]
async fn unreadable_pdf_is_stored_without_extracted_text() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let local = app.insert_affiliate("Local 63").await?;
    let (_, token) = app
        .insert_user("recorder", Some(local.affiliate_id), &[ROLE_OFFICER])
        .await?;

    let uploaded = app
        .upload(
            "scan.pdf",
            &[0xff, 0xfe, 0x00, 0xc3],
            json!({"title": "Scanned agreement", "type": "general", "category_group": "research"}),
            &token,
        )
        .await?;
    assert_eq!(uploaded["has_extracted_text"], false);

    let id = uploaded["id"].as_str().unwrap_or_default().to_string();
    let extract: Option<String> = app
        .with_conn(move |conn| {
            Ok(documents::table
                .filter(documents::public_id.eq(uuid::Uuid::parse_str(&id)?))
                .select(documents::content_extract)
                .first(conn)?)
        })
        .await?;
    assert!(extract.is_none());

    let (_, body) = app.get("/api/documents?q=scanned", Some(&token)).await?;
    assert_eq!(body["total"], 1);
    Ok(())
}
