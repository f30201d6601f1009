//! End-to-end tests for the CRUD dispatcher against a scripted transport

use std::sync::Arc;

use records_sdk::{
    ClientConfig, CrudDispatcher, Method, MockTransport, RecordsError, TransportError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

const DISCOVERY: &str = "/services/data/v59.0/sobjects";
const COLLECTION: &str = "/services/data/v59.0/sobjects/Account";
const DESCRIBE: &str = "/services/data/v59.0/sobjects/Account/describe";

fn discovery_listing() -> serde_json::Value {
    json!({
        "sobjects": [
            {
                "name": "Account",
                "urls": {
                    "sobject": COLLECTION,
                    "describe": DESCRIBE,
                    "rowTemplate": "/services/data/v59.0/sobjects/Account/{ID}"
                }
            },
            {
                "name": "AuditLog",
                "urls": {
                    "describe": "/services/data/v59.0/sobjects/AuditLog/describe",
                    "rowTemplate": "/services/data/v59.0/sobjects/AuditLog/{ID}"
                }
            }
        ]
    })
}

async fn connect() -> (Arc<MockTransport>, CrudDispatcher) {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, DISCOVERY, discovery_listing());

    let config = ClientConfig::new("https://example.my.salesforce.com");
    let dispatcher = CrudDispatcher::connect(transport.clone(), &config)
        .await
        .unwrap();
    (transport, dispatcher)
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Account {
    #[serde(rename = "Name")]
    name: String,
}

mod connect_tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_discovers_once() {
        let (transport, dispatcher) = connect().await;
        assert_eq!(transport.calls_to(Method::Get, DISCOVERY), 1);

        let all = dispatcher.describe_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_surfaces_discovery_failure() {
        let transport = Arc::new(MockTransport::new());
        transport.fail(
            Method::Get,
            DISCOVERY,
            TransportError::Status {
                status: 401,
                message: "Session expired or invalid".into(),
            },
        );

        let config = ClientConfig::new("https://example.my.salesforce.com");
        let result = CrudDispatcher::connect(transport.clone(), &config).await;
        assert!(matches!(result, Err(RecordsError::Discovery(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let transport = Arc::new(MockTransport::new());
        let result = CrudDispatcher::connect(transport.clone(), &ClientConfig::new("")).await;
        assert!(matches!(result, Err(RecordsError::Config(_))));
        assert_eq!(transport.call_count(), 0);
    }
}

mod primary_id_tests {
    use super::*;

    #[tokio::test]
    async fn test_read_substitutes_id() {
        let (transport, dispatcher) = connect().await;
        transport.respond(
            Method::Get,
            "/services/data/v59.0/sobjects/Account/001xx",
            json!({"Name": "Acme"}),
        );

        let account: Account = dispatcher.read("001xx", "Account", &[]).await.unwrap();
        assert_eq!(account.name, "Acme");

        let call = transport.last_call().unwrap();
        assert_eq!(call.uri, "/services/data/v59.0/sobjects/Account/001xx");
        assert!(call.params.is_empty());
    }

    #[tokio::test]
    async fn test_read_passes_field_list() {
        let (transport, dispatcher) = connect().await;
        transport.respond(
            Method::Get,
            "/services/data/v59.0/sobjects/Account/001xx",
            json!({"Name": "Acme"}),
        );

        let _: serde_json::Value = dispatcher
            .read("001xx", "Account", &["Name", "NotAField"])
            .await
            .unwrap();

        let call = transport.last_call().unwrap();
        assert_eq!(
            call.params,
            vec![("fields".to_string(), "Name,NotAField".to_string())]
        );
    }

    #[tokio::test]
    async fn test_read_surfaces_remote_rejection() {
        let (transport, dispatcher) = connect().await;
        transport.fail(
            Method::Get,
            "/services/data/v59.0/sobjects/Account/001xx",
            TransportError::Status {
                status: 400,
                message: "No such column 'NotAField'".into(),
            },
        );

        let result: Result<serde_json::Value, _> =
            dispatcher.read("001xx", "Account", &["NotAField"]).await;
        assert!(matches!(
            result,
            Err(RecordsError::Transport(TransportError::Status { status: 400, .. }))
        ));
    }

    #[tokio::test]
    async fn test_insert_posts_to_collection() {
        let (transport, dispatcher) = connect().await;
        transport.respond(
            Method::Post,
            COLLECTION,
            json!({"id": "001new", "success": true, "errors": []}),
        );

        let result = dispatcher
            .insert("Account", &Account { name: "Acme".into() })
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.id, "001new");

        let call = transport.last_call().unwrap();
        assert_eq!(call.method, Method::Post);
        assert_eq!(call.body, Some(json!({"Name": "Acme"})));
    }

    #[tokio::test]
    async fn test_insert_returns_application_errors() {
        let (transport, dispatcher) = connect().await;
        transport.respond(
            Method::Post,
            COLLECTION,
            json!({
                "id": "",
                "success": false,
                "errors": [{"message": "Required fields are missing: [Name]", "errorCode": "REQUIRED_FIELD_MISSING"}]
            }),
        );

        let result = dispatcher.insert("Account", &json!({})).await.unwrap();
        assert!(!result.success);
        assert!(matches!(
            result.into_result(),
            Err(RecordsError::Application(errors)) if errors[0].message.contains("Name")
        ));
    }

    #[tokio::test]
    async fn test_insert_without_collection_is_unknown_entity() {
        let (transport, dispatcher) = connect().await;
        let before = transport.call_count();

        let err = dispatcher
            .insert("AuditLog", &json!({"Message": "x"}))
            .await
            .unwrap_err();
        assert!(err.is_unknown_entity());
        assert_eq!(transport.call_count(), before);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (transport, dispatcher) = connect().await;
        let row = "/services/data/v59.0/sobjects/Account/001xx";
        transport.respond_empty(Method::Patch, row);
        transport.respond_empty(Method::Delete, row);

        dispatcher
            .update("001xx", "Account", &json!({"Name": "Acme Corp"}))
            .await
            .unwrap();
        dispatcher.delete("001xx", "Account").await.unwrap();

        assert_eq!(transport.calls_to(Method::Patch, row), 1);
        assert_eq!(transport.calls_to(Method::Delete, row), 1);
    }

    #[tokio::test]
    async fn test_delete_failure_passes_through() {
        let (transport, dispatcher) = connect().await;
        transport.fail(
            Method::Delete,
            "/services/data/v59.0/sobjects/Account/001gone",
            TransportError::Status {
                status: 404,
                message: "The requested resource does not exist".into(),
            },
        );

        let err = dispatcher.delete("001gone", "Account").await.unwrap_err();
        match err {
            RecordsError::Transport(source) => assert_eq!(source.status(), Some(404)),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

mod external_id_tests {
    use super::*;

    const EXTERNAL: &str = "/services/data/v59.0/sobjects/Account/External_Id__c/abc123";

    #[tokio::test]
    async fn test_read_by_external_id_composes_path() {
        let (transport, dispatcher) = connect().await;
        transport.respond(Method::Get, EXTERNAL, json!({"Name": "Acme"}));

        let account: Account = dispatcher
            .read_by_external_id("abc123", "External_Id__c", "Account", &["Name"])
            .await
            .unwrap();
        assert_eq!(account.name, "Acme");

        let call = transport.last_call().unwrap();
        assert_eq!(call.uri, EXTERNAL);
        assert_eq!(call.params, vec![("fields".to_string(), "Name".to_string())]);
    }

    #[tokio::test]
    async fn test_external_id_never_describes() {
        let (transport, dispatcher) = connect().await;
        transport.respond_empty(Method::Delete, EXTERNAL);

        dispatcher
            .delete_by_external_id("abc123", "External_Id__c", "Account")
            .await
            .unwrap();

        assert_eq!(transport.calls_to(Method::Get, DESCRIBE), 0);
        assert!(dispatcher.schema().cached("Account").is_none());
    }

    #[tokio::test]
    async fn test_upsert_created() {
        let (transport, dispatcher) = connect().await;
        transport.respond(
            Method::Patch,
            EXTERNAL,
            json!({"id": "001up", "success": true, "errors": [], "created": true}),
        );

        let result = dispatcher
            .upsert_by_external_id("abc123", "External_Id__c", "Account", &json!({"Name": "Acme"}))
            .await
            .unwrap();
        assert!(result.created);
        assert_eq!(result.id, "001up");
    }

    #[tokio::test]
    async fn test_upsert_updated_without_body() {
        let (transport, dispatcher) = connect().await;
        transport.respond_empty(Method::Patch, EXTERNAL);

        let result = dispatcher
            .upsert_by_external_id("abc123", "External_Id__c", "Account", &json!({"Name": "Acme"}))
            .await
            .unwrap();
        assert!(result.is_success());
        assert!(!result.created);
        assert_eq!(transport.calls_to(Method::Patch, EXTERNAL), 1);
    }

    #[tokio::test]
    async fn test_external_id_on_entity_without_collection() {
        let (transport, dispatcher) = connect().await;
        let before = transport.call_count();

        let err = dispatcher
            .delete_by_external_id("abc123", "External_Id__c", "AuditLog")
            .await
            .unwrap_err();
        assert!(err.is_unknown_entity());
        assert_eq!(transport.call_count(), before);
    }
}

mod unknown_entity_tests {
    use super::*;

    #[tokio::test]
    async fn test_every_operation_fails_fast() {
        let (transport, dispatcher) = connect().await;
        let before = transport.call_count();
        let body = json!({"Name": "x"});

        let errors = vec![
            dispatcher.describe("Contact").await.map(|_| ()).unwrap_err(),
            dispatcher
                .read::<serde_json::Value>("003", "Contact", &[])
                .await
                .map(|_| ())
                .unwrap_err(),
            dispatcher.insert("Contact", &body).await.map(|_| ()).unwrap_err(),
            dispatcher.update("003", "Contact", &body).await.unwrap_err(),
            dispatcher.delete("003", "Contact").await.unwrap_err(),
            dispatcher
                .read_by_external_id::<serde_json::Value>("x", "Ext__c", "Contact", &[])
                .await
                .map(|_| ())
                .unwrap_err(),
            dispatcher
                .upsert_by_external_id("x", "Ext__c", "Contact", &body)
                .await
                .map(|_| ())
                .unwrap_err(),
            dispatcher
                .delete_by_external_id("x", "Ext__c", "Contact")
                .await
                .unwrap_err(),
        ];

        for err in errors {
            assert!(err.is_unknown_entity(), "unexpected error: {err}");
        }
        assert_eq!(transport.call_count(), before);
    }
}

mod describe_tests {
    use super::*;

    #[tokio::test]
    async fn test_describe_once_and_projection() {
        let (transport, dispatcher) = connect().await;
        transport.respond(
            Method::Get,
            DESCRIBE,
            json!({
                "name": "Account",
                "fields": [
                    {"name": "Name", "type": "string"},
                    {"name": "Loc", "type": "location"},
                    {"name": "Id", "type": "string"}
                ]
            }),
        );

        let first = dispatcher.describe("Account").await.unwrap();
        let second = dispatcher.describe("Account").await.unwrap();

        assert_eq!(first.all_fields, "Name, Id");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.calls_to(Method::Get, DESCRIBE), 1);
    }

    #[tokio::test]
    async fn test_describe_retries_after_failure() {
        let (transport, dispatcher) = connect().await;
        transport
            .fail(Method::Get, DESCRIBE, TransportError::Network("reset".into()))
            .respond(Method::Get, DESCRIBE, json!([{"name": "Id", "type": "id"}]));

        assert!(matches!(
            dispatcher.describe("Account").await,
            Err(RecordsError::SchemaFetch { .. })
        ));
        assert_eq!(dispatcher.describe("Account").await.unwrap().all_fields, "Id");
        assert_eq!(transport.calls_to(Method::Get, DESCRIBE), 2);
    }
}
