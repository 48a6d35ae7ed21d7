use super::*;
use serde_json::json;
use std::sync::Mutex;

// Minimal fakes; the real backends live in the infrastructure crate.

#[derive(Default)]
struct FakeSchemas(Mutex<BTreeMap<String, SchemaDocument>>);

#[async_trait]
impl SchemaRepository for FakeSchemas {
    async fn get(&self, resource: &str) -> Result<Option<SchemaDocument>, ApplicationError> {
        Ok(self.0.lock().unwrap().get(resource).cloned())
    }

    async fn save(&self, resource: &str, schema: &SchemaDocument) -> Result<(), ApplicationError> {
        self.0
            .lock()
            .unwrap()
            .insert(resource.to_string(), schema.clone());
        Ok(())
    }

    async fn list(&self) -> Result<BTreeMap<String, SchemaDocument>, ApplicationError> {
        Ok(self.0.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct FakeRecords {
    records: Mutex<BTreeMap<String, Vec<Record>>>,
    next_id: Mutex<u64>,
}

#[async_trait]
impl RecordRepository for FakeRecords {
    async fn list(&self, resource: &str) -> Result<Vec<Record>, ApplicationError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(resource)
            .cloned()
            .unwrap_or_default())
    }

    async fn get(&self, resource: &str, id: RecordId) -> Result<Option<Record>, ApplicationError> {
        Ok(self
            .list(resource)
            .await?
            .into_iter()
            .find(|r| r.id() == id))
    }

    async fn create(
        &self,
        resource: &str,
        fields: Map<String, Value>,
    ) -> Result<Record, ApplicationError> {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let record = Record::new(RecordId::new(*next)?, fields);
        self.records
            .lock()
            .unwrap()
            .entry(resource.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        resource: &str,
        id: RecordId,
        fields: Map<String, Value>,
    ) -> Result<Option<Record>, ApplicationError> {
        let mut all = self.records.lock().unwrap();
        let Some(slot) = all
            .get_mut(resource)
            .and_then(|records| records.iter_mut().find(|r| r.id() == id))
        else {
            return Ok(None);
        };
        *slot = slot.replace_fields(fields);
        Ok(Some(slot.clone()))
    }

    async fn delete(&self, resource: &str, id: RecordId) -> Result<Option<Record>, ApplicationError> {
        let mut all = self.records.lock().unwrap();
        let Some(records) = all.get_mut(resource) else {
            return Ok(None);
        };
        let position = records.iter().position(|r| r.id() == id);
        Ok(position.map(|i| records.remove(i)))
    }
}

fn services() -> (SchemaService, ResourceService, Arc<FakeRecords>) {
    let schemas: Arc<dyn SchemaRepository> = Arc::new(FakeSchemas::default());
    let records = Arc::new(FakeRecords::default());
    (
        SchemaService::new(schemas.clone()),
        ResourceService::new(schemas, records.clone()),
        records,
    )
}

fn strict_users_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "email": {"type": "string", "format": "email"}
        },
        "required": ["name", "email"],
        "additionalProperties": false
    })
}

#[tokio::test]
async fn create_without_schema_accepts_any_object() {
    let (_, resources, _) = services();
    let first = resources
        .create_record("widgets", json!({"anything": [1, 2]}))
        .await
        .unwrap();
    let second = resources
        .create_record("widgets", json!({}))
        .await
        .unwrap();
    assert!(second.id() > first.id());
}

#[tokio::test]
async fn non_object_body_is_invalid_input() {
    let (_, resources, records) = services();
    let err = resources
        .create_record("widgets", json!([1, 2, 3]))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::InvalidInput(_)));
    assert!(records.list("widgets").await.unwrap().is_empty());
}

#[tokio::test]
async fn schema_replacement_gates_the_next_write() {
    let (schemas, resources, records) = services();
    resources
        .create_record("users", json!({"nickname": "before"}))
        .await
        .unwrap();

    schemas
        .put_schema("users", strict_users_schema())
        .await
        .unwrap();

    let err = resources
        .create_record("users", json!({"nickname": "after"}))
        .await
        .unwrap_err();
    let ApplicationError::Validation(violations) = err else {
        panic!("expected validation error, got {:?}", err);
    };
    let rendered: Vec<String> = violations.iter().map(ToString::to_string).collect();
    assert!(rendered.contains(&"missing required field: name".to_string()));
    assert!(rendered.contains(&"missing required field: email".to_string()));
    assert!(rendered.contains(&"unexpected field: nickname".to_string()));

    // Rejected write left the collection untouched; the earlier record stays.
    assert_eq!(records.list("users").await.unwrap().len(), 1);

    let created = resources
        .create_record("users", json!({"name": "Ada", "email": "ada@example.com"}))
        .await
        .unwrap();
    assert_eq!(created.fields().get("name"), Some(&json!("Ada")));
}

#[tokio::test]
async fn update_requires_full_document_and_keeps_id() {
    let (schemas, resources, _) = services();
    schemas
        .put_schema("users", strict_users_schema())
        .await
        .unwrap();
    let created = resources
        .create_record("users", json!({"name": "Ada", "email": "ada@example.com"}))
        .await
        .unwrap();

    let err = resources
        .update_record("users", created.id(), json!({"name": "Grace"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Validation(v) if v.len() == 1));

    let updated = resources
        .update_record(
            "users",
            created.id(),
            json!({"name": "Grace", "email": "grace@example.com"}),
        )
        .await
        .unwrap();
    assert_eq!(updated.id(), created.id());
    assert_eq!(updated.fields().get("name"), Some(&json!("Grace")));
}

#[tokio::test]
async fn missing_records_are_not_found() {
    let (_, resources, _) = services();
    let id = RecordId::new(9).unwrap();
    assert!(matches!(
        resources.get_record("things", id).await,
        Err(ApplicationError::RecordNotFound { .. })
    ));
    assert!(matches!(
        resources.update_record("things", id, json!({})).await,
        Err(ApplicationError::RecordNotFound { .. })
    ));
    assert!(matches!(
        resources.delete_record("things", id).await,
        Err(ApplicationError::RecordNotFound { .. })
    ));
}

#[tokio::test]
async fn invalid_resource_names_are_rejected() {
    let (schemas, resources, _) = services();
    let err = resources
        .create_record("bad name", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::DomainError(DomainError::InvalidResourceName(_))
    ));
    let err = schemas
        .put_schema("schemas", json!({"type": "object"}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::DomainError(DomainError::ReservedResourceName(_))
    ));
    let err = schemas.get_schema("../users").await.unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::DomainError(DomainError::InvalidResourceName(_))
    ));
}

#[tokio::test]
async fn schema_put_rejects_malformed_documents() {
    let (schemas, _, _) = services();
    let err = schemas
        .put_schema("users", json!({"properties": {}}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::DomainError(DomainError::InvalidSchema(_))
    ));
    assert!(matches!(
        schemas.get_schema("users").await,
        Err(ApplicationError::SchemaNotFound(name)) if name == "users"
    ));
}

#[tokio::test]
async fn seeding_skips_existing_schemas() {
    let (schemas, _, _) = services();
    schemas
        .put_schema("users", json!({"type": "object"}))
        .await
        .unwrap();

    assert_eq!(schemas.seed_defaults().await.unwrap(), 3);
    assert_eq!(
        schemas.get_schema("users").await.unwrap().to_value(),
        json!({"type": "object"})
    );
    let listed = schemas.list_schemas().await.unwrap();
    assert_eq!(
        listed.keys().cloned().collect::<Vec<_>>(),
        vec!["consumption", "devices", "locations", "users"]
    );
    assert_eq!(schemas.seed_defaults().await.unwrap(), 0);
}

#[tokio::test]
async fn list_records_paginates_in_creation_order() {
    let (_, resources, _) = services();
    for n in 0..25 {
        resources
            .create_record("readings", json!({"n": n}))
            .await
            .unwrap();
    }
    let page = resources
        .list_records("readings", PageRequest::new(3, 10), "/readings")
        .await
        .unwrap();
    assert_eq!(page.data.len(), 5);
    assert_eq!(page.data[0].fields().get("n"), Some(&json!(20)));
    assert_eq!(page.metadata.next_page, None);
    assert_eq!(
        page.metadata.prev_page.as_deref(),
        Some("/readings?page=2&per_page=10")
    );
}
