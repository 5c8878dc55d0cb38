#[cfg(test)]
mod integration_tests {
    use crate::handlers::profile::UpdateProfileRequest;
    use crate::router::create_router;
    use crate::schemas::AppState;
    use crate::storage::AvatarStore;
    use crate::test_utils::test_utils::{
        bearer_for, seed_course, seed_enrollment, seed_sale, seed_sale_detail, seed_user,
        setup_test_app, setup_test_app_state, setup_test_db, test_config,
    };
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    use axum::body::Bytes;
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use model::entities::{course_student, user};
    use sea_orm::EntityTrait;

    fn authorization(bearer: &str) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(bearer).expect("Invalid header value"),
        )
    }

    #[tokio::test]
    async fn test_health_check() {
        // Setup test server
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        // Send GET request to health endpoint
        let response = server.get("/health").await;

        // Verify response
        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn test_profile_requires_authentication() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server.get("/profile").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "User not authenticated");
    }

    #[tokio::test]
    async fn test_profile_rejects_invalid_token() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let (name, value) = authorization("Bearer not-a-real-token");
        let response = server.get("/profile").add_header(name, value).await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_profile_aggregates_enrollments_and_sales() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;
        let other = seed_user(&state.db, "jose@example.com").await;

        let rust_course = seed_course(&state.db, "Rust for Backends", Some(4)).await;
        let sql_course = seed_course(&state.db, "Intro to SQL", None).await;

        // Three enrollments: one in progress, one terminated without
        // progress, one untouched with an empty checked list
        let in_progress =
            seed_enrollment(&state.db, student.id, rust_course.id, Some("1,2,3"), 1).await;
        seed_enrollment(
            &state.db,
            student.id,
            sql_course.id,
            None,
            course_student::STATE_TERMINATED,
        )
        .await;
        seed_enrollment(&state.db, student.id, sql_course.id, Some(""), 1).await;

        // Another user's enrollment must not leak into the response
        seed_enrollment(&state.db, other.id, rust_course.id, Some("1"), 1).await;

        // Two purchases, three line items in total
        let first_sale = seed_sale(&state.db, student.id).await;
        let second_sale = seed_sale(&state.db, student.id).await;
        let d1 = seed_sale_detail(&state.db, first_sale.id, rust_course.id, Some("Great")).await;
        let d2 = seed_sale_detail(&state.db, second_sale.id, sql_course.id, None).await;
        let d3 = seed_sale_detail(&state.db, second_sale.id, rust_course.id, None).await;

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server.get("/profile").add_header(name, value).await;

        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();

        // User block with empty-string defaults for missing fields
        assert_eq!(body["user"]["name"], "Maria");
        assert_eq!(body["user"]["surname"], "Lopez");
        assert_eq!(body["user"]["email"], "maria@example.com");
        assert_eq!(body["user"]["phone"], "");
        assert_eq!(body["user"]["profession"], "");
        assert_eq!(body["user"]["description"], "");
        assert_eq!(body["user"]["avatar"], serde_json::Value::Null);

        // Counts agree with the list lengths
        assert_eq!(body["enrolled_course_count"], 3);
        assert_eq!(body["active_course_count"], 1);
        assert_eq!(body["termined_course_count"], 1);
        assert_eq!(body["enrolled_courses"].as_array().unwrap().len(), 3);
        assert_eq!(body["active_courses"].as_array().unwrap().len(), 1);
        assert_eq!(body["termined_courses"].as_array().unwrap().len(), 1);

        // The in-progress enrollment reports 3/4 completion
        let active = &body["active_courses"][0];
        assert_eq!(active["id"], in_progress.id);
        assert_eq!(active["clases_checkeds"].as_array().unwrap().len(), 3);
        assert_eq!(active["percentage"], 75.0);
        assert_eq!(active["course"]["title"], "Rust for Backends");
        assert_eq!(
            active["course"]["image"],
            "http://shop.test/storage/courses/cover.png"
        );

        // Sale details come back newest first with formatted timestamps
        let details = body["sale_details"].as_array().unwrap();
        assert_eq!(details.len(), 3);
        assert_eq!(details[0]["id"], d3.id);
        assert_eq!(details[1]["id"], d2.id);
        assert_eq!(details[2]["id"], d1.id);
        assert_eq!(details[2]["review"], "Great");
        assert_eq!(details[0]["review"], serde_json::Value::Null);
        assert_eq!(details[0]["created_at"], "2024-03-01 10:30:00");

        // Sales too, newest first
        let sales = body["sales"].as_array().unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0]["id"], second_sale.id);
        assert_eq!(sales[1]["id"], first_sale.id);
        assert_eq!(sales[0]["total"], "59.98");
    }

    #[tokio::test]
    async fn test_profile_zero_progress_without_class_count() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;
        let course = seed_course(&state.db, "Intro to SQL", Some(0)).await;
        seed_enrollment(&state.db, student.id, course.id, Some("1,2"), 1).await;

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server.get("/profile").add_header(name, value).await;

        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["enrolled_courses"][0]["percentage"], 0.0);
        assert_eq!(
            body["enrolled_courses"][0]["clases_checkeds"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_profile_empty_for_new_user() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server.get("/profile").add_header(name, value).await;

        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["enrolled_course_count"], 0);
        assert_eq!(body["active_course_count"], 0);
        assert_eq!(body["termined_course_count"], 0);
        assert!(body["enrolled_courses"].as_array().unwrap().is_empty());
        assert!(body["sale_details"].as_array().unwrap().is_empty());
        assert!(body["sales"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_requires_authentication() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server
            .put("/update_client")
            .json(&UpdateProfileRequest::default())
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_with_no_fields_changes_nothing() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server
            .put("/update_client")
            .add_header(name, value)
            .json(&UpdateProfileRequest::default())
            .await;

        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Profile updated successfully");
        assert_eq!(body["status"], 200);

        // The stored row is untouched
        let stored = user::Entity::find_by_id(student.id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, student);
    }

    #[tokio::test]
    async fn test_update_applies_partial_fields() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;

        let request = UpdateProfileRequest {
            name: Some("Maria Jose".to_string()),
            profession: Some("Engineer".to_string()),
            description: Some("Learning Rust".to_string()),
            ..Default::default()
        };

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server
            .put("/update_client")
            .add_header(name, value)
            .json(&request)
            .await;

        response.assert_status(StatusCode::OK);

        let stored = user::Entity::find_by_id(student.id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Maria Jose");
        assert_eq!(stored.profession.as_deref(), Some("Engineer"));
        assert_eq!(stored.description.as_deref(), Some("Learning Rust"));
        // Untouched fields stay as they were
        assert_eq!(stored.surname.as_deref(), Some("Lopez"));
        assert_eq!(stored.email, "maria@example.com");
    }

    #[tokio::test]
    async fn test_update_works_through_patch() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;

        let request = UpdateProfileRequest {
            phone: Some("555-0100".to_string()),
            ..Default::default()
        };

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server
            .patch("/update_client")
            .add_header(name, value)
            .json(&request)
            .await;

        response.assert_status(StatusCode::OK);

        let stored = user::Entity::find_by_id(student.id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.phone.as_deref(), Some("555-0100"));
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_fields() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;

        let request = UpdateProfileRequest {
            name: Some("x".repeat(256)),
            email: Some("not-an-email".to_string()),
            new_password: Some("abc".to_string()),
            ..Default::default()
        };

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server
            .put("/update_client")
            .add_header(name, value)
            .json(&request)
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        let errors = body["errors"].as_object().unwrap();
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("new_password"));

        // Nothing was applied
        let stored = user::Entity::find_by_id(student.id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Maria");
        assert_eq!(stored.email, "maria@example.com");
    }

    #[tokio::test]
    async fn test_update_rejects_email_taken_by_other_user() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;
        seed_user(&state.db, "jose@example.com").await;

        let request = UpdateProfileRequest {
            email: Some("jose@example.com".to_string()),
            ..Default::default()
        };

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server
            .put("/update_client")
            .add_header(name, value)
            .json(&request)
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        let email_errors = body["errors"]["email"].as_array().unwrap();
        assert!(email_errors
            .iter()
            .any(|m| m == "The email has already been taken."));
    }

    #[tokio::test]
    async fn test_update_accepts_own_unchanged_email() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;

        let request = UpdateProfileRequest {
            email: Some("maria@example.com".to_string()),
            ..Default::default()
        };

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server
            .put("/update_client")
            .add_header(name, value)
            .json(&request)
            .await;

        response.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_hashes_new_password() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;

        let request = UpdateProfileRequest {
            new_password: Some("secret123".to_string()),
            ..Default::default()
        };

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server
            .put("/update_client")
            .add_header(name, value)
            .json(&request)
            .await;

        response.assert_status(StatusCode::OK);

        let stored = user::Entity::find_by_id(student.id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();

        // The plaintext is never persisted; the stored hash verifies
        assert_ne!(stored.password, "secret123");
        let parsed = PasswordHash::new(&stored.password).unwrap();
        assert!(Argon2::default()
            .verify_password(b"secret123", &parsed)
            .is_ok());
    }

    fn multipart_body(
        boundary: &str,
        text_fields: &[(&str, &str)],
        image_bytes: Option<&[u8]>,
    ) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in text_fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(bytes) = image_bytes {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"avatar.png\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }

    #[tokio::test]
    async fn test_multipart_update_sets_text_fields() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;

        let boundary = "aula-test-boundary";
        let body = multipart_body(boundary, &[("name", "Renamed"), ("phone", "555-0199")], None);

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server
            .put("/update_client")
            .add_header(name, value)
            .content_type(&format!("multipart/form-data; boundary={boundary}"))
            .bytes(Bytes::from(body))
            .await;

        response.assert_status(StatusCode::OK);

        let stored = user::Entity::find_by_id(student.id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.phone.as_deref(), Some("555-0199"));
    }

    #[tokio::test]
    async fn test_avatar_upload_replaces_previous_file() {
        // Keep a handle on the storage dir so the test can inspect it
        let storage_dir = tempfile::tempdir().unwrap();
        let state = AppState {
            db: setup_test_db().await,
            config: test_config(),
            storage: AvatarStore::new(storage_dir.path()),
        };
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;
        let boundary = "aula-test-boundary";

        // First upload
        let body = multipart_body(boundary, &[], Some(b"\x89PNG first image"));
        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server
            .put("/update_client")
            .add_header(name.clone(), value.clone())
            .content_type(&format!("multipart/form-data; boundary={boundary}"))
            .bytes(Bytes::from(body))
            .await;
        response.assert_status(StatusCode::OK);

        let stored = user::Entity::find_by_id(student.id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        let first_avatar = stored.avatar.clone().expect("avatar should be recorded");
        assert!(first_avatar.starts_with("users/"));
        assert!(first_avatar.ends_with(".png"));
        assert!(storage_dir.path().join(&first_avatar).exists());

        // Second upload replaces both the file and the reference
        let body = multipart_body(boundary, &[], Some(b"\x89PNG second image"));
        let response = server
            .put("/update_client")
            .add_header(name, value)
            .content_type(&format!("multipart/form-data; boundary={boundary}"))
            .bytes(Bytes::from(body))
            .await;
        response.assert_status(StatusCode::OK);

        let stored = user::Entity::find_by_id(student.id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        let second_avatar = stored.avatar.clone().expect("avatar should be recorded");
        assert_ne!(second_avatar, first_avatar);
        assert!(!storage_dir.path().join(&first_avatar).exists());
        assert!(storage_dir.path().join(&second_avatar).exists());

        // Exactly one stored file remains
        let files: Vec<_> = std::fs::read_dir(storage_dir.path().join("users"))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_avatar_upload_rejects_unsupported_type() {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let student = seed_user(&state.db, "maria@example.com").await;
        let boundary = "aula-test-boundary";

        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"doc.pdf\"\r\nContent-Type: application/pdf\r\n\r\nnot an image\r\n--{boundary}--\r\n"
            )
            .as_bytes(),
        );

        let (name, value) = authorization(&bearer_for(&state, student.id));
        let response = server
            .put("/update_client")
            .add_header(name, value)
            .content_type(&format!("multipart/form-data; boundary={boundary}"))
            .bytes(Bytes::from(body))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let response_body: serde_json::Value = response.json();
        assert!(response_body["errors"]
            .as_object()
            .unwrap()
            .contains_key("image"));

        // No file was stored and no reference recorded
        let stored = user::Entity::find_by_id(student.id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.avatar, None);
    }
}
