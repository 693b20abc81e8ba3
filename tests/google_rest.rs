//! Wire-level tests for the Google Sheets and Drive clients.
//!
//! A local `wiremock` server plays the Google REST endpoints, so these run
//! offline and check the exact requests the clients send.
//!
//! Run with:
//!   cargo test --test google_rest

use chrono::{TimeZone, Utc};
use facesheet::remote::drive::GoogleDrive;
use facesheet::remote::sheets::GoogleSheets;
use facesheet::remote::{AssetStore, ObjectStore, TabularSource, FOLDER_MIME};
use facesheet::{GoogleConfig, RemoteError};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

// ── Test helpers ─────────────────────────────────────────────────────────────

fn google_config(server: &MockServer) -> GoogleConfig {
    GoogleConfig::new(TOKEN).with_base_url(server.uri())
}

fn sheets(server: &MockServer) -> GoogleSheets {
    GoogleSheets::new(google_config(server)).unwrap()
}

fn drive(server: &MockServer) -> GoogleDrive {
    GoogleDrive::new(google_config(server)).unwrap()
}

// ── Sheets ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sheet_title_is_read_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/s1"))
        .and(query_param("fields", "properties.title"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": { "title": "Spring Roster" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(sheets(&server).title("s1").await.unwrap(), "Spring Roster");
}

#[tokio::test]
async fn test_worksheet_rows_come_back_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/s1/values/Settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Settings!A1:Z1000",
            "majorDimension": "ROWS",
            "values": [["Key", "Value"], ["PDFSize", "Letter"], ["Columns", 4], ["Lonely"]]
        })))
        .mount(&server)
        .await;

    let rows = sheets(&server).rows("s1", "Settings").await.unwrap();

    assert_eq!(
        rows,
        vec![
            vec!["Key", "Value"],
            vec!["PDFSize", "Letter"],
            vec!["Columns", "4"],
            vec!["Lonely"],
        ]
    );
}

#[tokio::test]
async fn test_empty_worksheet_has_no_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/s1/values/People"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "People!A1:Z1000",
            "majorDimension": "ROWS"
        })))
        .mount(&server)
        .await;

    assert!(sheets(&server).rows("s1", "People").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_worksheet_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/s1/values/People"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "Unable to parse range: People",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&server)
        .await;

    let err = sheets(&server).rows("s1", "People").await.unwrap_err();
    assert!(matches!(err, RemoteError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn test_permission_denied_stays_an_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/s1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("The caller does not have permission"))
        .mount(&server)
        .await;

    let err = sheets(&server).title("s1").await.unwrap_err();
    assert!(matches!(err, RemoteError::Http { status: 403, .. }), "{err:?}");
}

#[tokio::test]
async fn test_sheets_are_listed_from_the_folder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param(
            "q",
            "'root-folder' in parents and mimeType='application/vnd.google-apps.spreadsheet' and trashed=false",
        ))
        .and(query_param("orderBy", "modifiedTime desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                { "id": "new", "name": "Spring Roster", "modifiedTime": "2025-03-07T14:05:00.000Z" },
                { "id": "old", "name": "Autumn Roster" }
            ]
        })))
        .mount(&server)
        .await;

    let listed = sheets(&server).list_sheets("root-folder").await.unwrap();

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, "new");
    assert_eq!(
        listed[0].modified_time,
        Some(Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 0).unwrap())
    );
    assert_eq!(listed[1].modified_display(), "");
}

// ── Drive: assets ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_folder_listing_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "'imgs' in parents and trashed=false"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "page-2",
            "files": [
                { "id": "f1", "name": "jane_doe.png", "mimeType": "image/png" },
                { "id": "f2", "name": "Archive", "mimeType": FOLDER_MIME }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "f3", "name": "john_roe.jpg", "mimeType": "image/jpeg" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let drive = drive(&server);
    let first = drive.list_children("imgs", None).await.unwrap();
    assert_eq!(first.entries.len(), 2);
    assert!(first.entries[1].is_folder());
    let token = first.next_page_token.unwrap();
    let second = drive.list_children("imgs", Some(&token)).await.unwrap();
    assert_eq!(second.entries[0].name, "john_roe.jpg");
    assert!(second.next_page_token.is_none());
}

#[tokio::test]
async fn test_subfolder_lookup_escapes_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param(
            "q",
            "'imgs' in parents and name='Staff\\'s photos' and mimeType='application/vnd.google-apps.folder' and trashed=false",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "sub", "name": "Staff's photos", "mimeType": FOLDER_MIME }]
        })))
        .mount(&server)
        .await;

    let found = drive(&server)
        .find_folder("imgs", "Staff's photos")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, "sub");
}

#[tokio::test]
async fn test_file_bytes_and_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/f1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/f1"))
        .and(query_param("fields", "size"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "size": "4" })))
        .mount(&server)
        .await;

    let drive = drive(&server);
    assert_eq!(drive.fetch_bytes("f1").await.unwrap(), vec![0x89, b'P', b'N', b'G']);
    assert_eq!(drive.file_size("f1").await.unwrap(), Some(4));
}

// ── Drive: publishing ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_find_by_name_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param(
            "q",
            "'out' in parents and name='Spring Roster.pdf' and trashed=false",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "old-1" }, { "id": "old-2" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/old-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/old-2"))
        .respond_with(ResponseTemplate::new(404).set_body_string("File not found"))
        .mount(&server)
        .await;

    let drive = drive(&server);
    let ids = drive.find_by_name("out", "Spring Roster.pdf").await.unwrap();
    assert_eq!(ids, ["old-1", "old-2"]);
    drive.delete("old-1").await.unwrap();
    let err = drive.delete("old-2").await.unwrap_err();
    assert!(matches!(err, RemoteError::Http { status: 404, .. }));
}

#[tokio::test]
async fn test_resumable_upload_sends_chunks_until_complete() {
    const CHUNK: usize = 256 * 1024;
    let server = MockServer::start().await;
    let session = format!("{}/upload/session/abc", server.uri());
    let total = CHUNK + 1000;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "resumable"))
        .and(header("x-upload-content-type", "application/pdf"))
        .and(header("x-upload-content-length", total.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", session.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/abc"))
        .and(header("content-range", format!("bytes 0-{}/{total}", CHUNK - 1).as_str()))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-262143"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/abc"))
        .and(header("content-range", format!("bytes {CHUNK}-{}/{total}", total - 1).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "new-pdf" })))
        .expect(1)
        .mount(&server)
        .await;

    let drive = GoogleDrive::new(google_config(&server).with_upload_chunk_size(CHUNK)).unwrap();
    let id = drive
        .create("out", "Spring Roster.pdf", "application/pdf", vec![7u8; total])
        .await
        .unwrap();

    assert_eq!(id, "new-pdf");
}

#[tokio::test]
async fn test_upload_rejected_at_session_start() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(403).set_body_string("storageQuotaExceeded"))
        .mount(&server)
        .await;

    let err = drive(&server)
        .create("out", "x.pdf", "application/pdf", b"%PDF".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Http { status: 403, ref body } if body.contains("Quota")));
}

#[tokio::test]
async fn test_resumable_upload_resends_from_acknowledged_offset() {
    const CHUNK: usize = 256 * 1024;
    let server = MockServer::start().await;
    let session = format!("{}/upload/session/partial", server.uri());
    let total = CHUNK + 1000;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", session.as_str()))
        .mount(&server)
        .await;
    // Only the first 100 bytes of the first slice are kept.
    Mock::given(method("PUT"))
        .and(path("/upload/session/partial"))
        .and(header("content-range", format!("bytes 0-{}/{total}", CHUNK - 1).as_str()))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-99"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/partial"))
        .and(header("content-range", format!("bytes 100-{}/{total}", 100 + CHUNK - 1).as_str()))
        .respond_with(
            ResponseTemplate::new(308)
                .insert_header("Range", format!("bytes=0-{}", 100 + CHUNK - 1).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/partial"))
        .and(header("content-range", format!("bytes {}-{}/{total}", 100 + CHUNK, total - 1).as_str()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "resumed-pdf" })))
        .expect(1)
        .mount(&server)
        .await;

    let drive = GoogleDrive::new(google_config(&server).with_upload_chunk_size(CHUNK)).unwrap();
    let id = drive
        .create("out", "Spring Roster.pdf", "application/pdf", vec![7u8; total])
        .await
        .unwrap();

    assert_eq!(id, "resumed-pdf");
}

#[tokio::test]
async fn test_resumable_upload_gives_up_when_nothing_is_kept() {
    let server = MockServer::start().await;
    let session = format!("{}/upload/session/stuck", server.uri());

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).insert_header("Location", session.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/stuck"))
        .and(header("content-range", "bytes 0-3/4"))
        .respond_with(ResponseTemplate::new(308))
        .expect(4)
        .mount(&server)
        .await;

    let err = drive(&server)
        .create("out", "x.pdf", "application/pdf", b"%PDF".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Decode(ref m) if m.contains("stalled")), "{err:?}");
}

#[tokio::test]
async fn test_find_by_name_reads_every_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "more",
            "files": [{ "id": "old-1" }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "more"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "old-2" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ids = drive(&server)
        .find_by_name("out", "Spring Roster.pdf")
        .await
        .unwrap();
    assert_eq!(ids, ["old-1", "old-2"]);
}

#[tokio::test]
async fn test_sheet_listing_reads_every_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "p2",
            "files": [{ "id": "new", "name": "Spring Roster" }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{ "id": "old", "name": "Autumn Roster" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let listed = sheets(&server).list_sheets("root-folder").await.unwrap();
    let ids: Vec<_> = listed.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["new", "old"]);
}
