//! Tenant isolation tests.
//!
//! Every entity operation goes through a bound context; these tests check that
//! a context never observes rows from another tenant's partition.

mod common;

use std::sync::Arc;

use serde_json::json;

use realty_persistence::backends::sqlite::SqliteBackend;
use realty_persistence::catalog::EntityDefinition;
use realty_persistence::core::{EntityStorage, PartitionRegistry};
use realty_persistence::error::{CatalogError, EntityError, StorageError, ValidationError};
use realty_persistence::provision::{Provisioner, ProvisioningConfig};
use realty_persistence::tenant::{BoundContext, PartitionId};
use realty_persistence::types::Pagination;

use common::*;

fn definition<'a>(provisioner: &'a Provisioner<SqliteBackend>, name: &str) -> &'a EntityDefinition {
    provisioner.catalog().get(name).unwrap()
}

async fn two_tenants() -> (Provisioner<SqliteBackend>, BoundContext, BoundContext) {
    let provisioner = create_provisioner().await;
    provisioner
        .provision(&descriptor("Acme", "acme.example.com"))
        .await
        .unwrap();
    provisioner
        .provision(&descriptor("Globex", "globex.example.com"))
        .await
        .unwrap();

    let acme = bind_host(provisioner.store().as_ref(), "acme.example.com").await;
    let globex = bind_host(provisioner.store().as_ref(), "globex.example.com").await;
    (provisioner, acme, globex)
}

// ============================================================================
// Partition boundaries
// ============================================================================

#[tokio::test]
async fn test_rows_invisible_across_tenants() {
    let (provisioner, acme, globex) = two_tenants().await;
    let store = provisioner.store();
    let property = definition(&provisioner, "property");

    let created = store
        .create(&acme, property, json!({"name": "Elm Court"}))
        .await
        .unwrap();
    assert_eq!(created.partition_id, *acme.current_partition());

    assert!(store.read(&acme, property, &created.id).await.unwrap().is_some());
    assert!(store.read(&globex, property, &created.id).await.unwrap().is_none());

    assert_eq!(store.count(&acme, property).await.unwrap(), 1);
    assert_eq!(store.count(&globex, property).await.unwrap(), 0);
    let page = store
        .list(&globex, property, Pagination::default())
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_same_id_in_both_partitions() {
    let (provisioner, acme, globex) = two_tenants().await;
    let store = provisioner.store();
    let property = definition(&provisioner, "property");

    store
        .create(&acme, property, json!({"id": "hq", "name": "Acme Tower"}))
        .await
        .unwrap();
    store
        .create(&globex, property, json!({"id": "hq", "name": "Globex Plaza"}))
        .await
        .unwrap();

    let a = store.read(&acme, property, "hq").await.unwrap().unwrap();
    let g = store.read(&globex, property, "hq").await.unwrap().unwrap();
    assert_eq!(a.fields["name"], "Acme Tower");
    assert_eq!(g.fields["name"], "Globex Plaza");

    let duplicate = store
        .create(&acme, property, json!({"id": "hq", "name": "Again"}))
        .await;
    assert!(matches!(
        duplicate,
        Err(StorageError::Entity(EntityError::AlreadyExists { .. }))
    ));
}

#[tokio::test]
async fn test_shared_entity_visible_to_all() {
    let (provisioner, acme, globex) = two_tenants().await;
    let store = provisioner.store();
    let plan = definition(&provisioner, "subscription_plan");

    let created = store
        .create(&acme, plan, json!({"id": "pro", "name": "Pro", "max_units": 500}))
        .await
        .unwrap();
    assert_eq!(created.partition_id, *store.shared_partition());

    let seen = store.read(&globex, plan, "pro").await.unwrap().unwrap();
    assert_eq!(seen.fields["max_units"], 500);

    // Isolated rows may reference shared ones.
    let property = definition(&provisioner, "property");
    store
        .create(&globex, property, json!({"name": "Globex Plaza", "plan_id": "pro"}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cross_tenant_reference_rejected() {
    let (provisioner, acme, globex) = two_tenants().await;
    let store = provisioner.store();
    let property = definition(&provisioner, "property");
    let unit = definition(&provisioner, "unit");

    store
        .create(&acme, property, json!({"id": "p-1", "name": "Elm Court"}))
        .await
        .unwrap();

    let result = store
        .create(&globex, unit, json!({"property_id": "p-1", "unit_number": "1A"}))
        .await;
    match result {
        Err(StorageError::Entity(EntityError::ReferenceNotFound { field, target, id, .. })) => {
            assert_eq!(field, "property_id");
            assert_eq!(target, "property");
            assert_eq!(id, "p-1");
        }
        other => panic!("Expected ReferenceNotFound, got {:?}", other),
    }

    store
        .create(&acme, unit, json!({"property_id": "p-1", "unit_number": "1A"}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_check_access_reports_breach() {
    let (provisioner, acme, globex) = two_tenants().await;

    assert!(acme.check_access(acme.current_partition()).is_ok());
    assert!(acme.check_access(provisioner.store().shared_partition()).is_ok());

    let err: StorageError = acme
        .check_access(globex.current_partition())
        .unwrap_err()
        .into();
    assert!(err.is_isolation_breach());
    assert!(!StorageError::from(ValidationError::MissingRequiredField {
        field: "lease.unit_id".to_string()
    })
    .is_isolation_breach());
}

// ============================================================================
// Records
// ============================================================================

#[tokio::test]
async fn test_create_validates_record() {
    let (provisioner, acme, _) = two_tenants().await;
    let store = provisioner.store();
    let unit = definition(&provisioner, "unit");
    store
        .create(&acme, definition(&provisioner, "property"), json!({"id": "p-1", "name": "Elm"}))
        .await
        .unwrap();

    let cases = [
        json!({"property_id": "p-1"}),
        json!({"property_id": "p-1", "unit_number": 4}),
        json!({"property_id": "p-1", "unit_number": "4", "floor": 2}),
        json!({"property_id": "p-1", "unit_number": "4", "bedrooms": 1.5}),
        json!({"id": "bad id", "property_id": "p-1", "unit_number": "4"}),
        json!(["not", "an", "object"]),
    ];
    for record in cases {
        let result = store.create(&acme, unit, record.clone()).await;
        assert!(
            matches!(result, Err(StorageError::Validation(_))),
            "{} should be rejected, got {:?}",
            record,
            result
        );
    }
    assert_eq!(store.count(&acme, unit).await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_round_trips_field_types() {
    let (provisioner, acme, _) = two_tenants().await;
    let store = provisioner.store();
    let property = definition(&provisioner, "property");
    let unit = definition(&provisioner, "unit");

    store
        .create(
            &acme,
            property,
            json!({"id": "p-1", "name": "Elm Court", "amenities": {"pool": true, "parking": ["A", "B"]}}),
        )
        .await
        .unwrap();
    store
        .create(
            &acme,
            unit,
            json!({"id": "u-1", "property_id": "p-1", "unit_number": "1A", "bedrooms": 2, "furnished": false}),
        )
        .await
        .unwrap();

    let p = store.read(&acme, property, "p-1").await.unwrap().unwrap();
    assert_eq!(p.fields["amenities"], json!({"pool": true, "parking": ["A", "B"]}));
    assert!(p.fields["plan_id"].is_null());

    let u = store.read(&acme, unit, "u-1").await.unwrap().unwrap();
    assert_eq!(u.fields["bedrooms"], 2);
    assert_eq!(u.fields["furnished"], false);
    assert_eq!(u.created_at, u.updated_at);
}

#[tokio::test]
async fn test_unprovisioned_entity_is_unknown() {
    let (provisioner, acme, _) = two_tenants().await;
    let vendor = EntityDefinition::isolated("maintenance", "vendor");

    let result = provisioner.store().count(&acme, &vendor).await;
    assert!(matches!(
        result,
        Err(StorageError::Catalog(CatalogError::UnknownEntity { .. }))
    ));
}

#[tokio::test]
async fn test_list_pagination() {
    let (provisioner, acme, _) = two_tenants().await;
    let store = provisioner.store();
    let resident = definition(&provisioner, "resident");

    for i in 0..5 {
        store
            .create(
                &acme,
                resident,
                json!({"id": format!("r-{}", i), "full_name": format!("Resident {}", i)}),
            )
            .await
            .unwrap();
    }

    let first = store
        .list(&acme, resident, Pagination::new(2, 0))
        .await
        .unwrap();
    assert_eq!(first.total, 5);
    assert!(first.has_more());
    let ids: Vec<&str> = first.items.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["r-0", "r-1"]);

    let last = store
        .list(&acme, resident, Pagination::new(2, 4))
        .await
        .unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].id, "r-4");
    assert!(!last.has_more());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tenants_stay_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner =
        create_provisioner_with(create_file_backend(&dir), ProvisioningConfig::default()).await;
    let names = ["Acme", "Globex", "Initech"];
    for name in names {
        let domain = format!("{}.example.com", name.to_lowercase());
        provisioner.provision(&descriptor(name, &domain)).await.unwrap();
    }

    let store = Arc::clone(provisioner.store());
    let resident = Arc::clone(provisioner.catalog().get("resident").unwrap());
    let mut handles = Vec::new();
    for name in names {
        for i in 0..10 {
            let store = Arc::clone(&store);
            let resident = Arc::clone(&resident);
            handles.push(tokio::spawn(async move {
                let host = format!("{}.example.com", name.to_lowercase());
                let ctx = bind_host(store.as_ref(), &host).await;
                store
                    .create(
                        &ctx,
                        &resident,
                        json!({"full_name": format!("{} resident {}", name, i)}),
                    )
                    .await
                    .map(|e| (ctx.current_partition().clone(), e))
            }));
        }
    }

    for handle in handles {
        let (partition, entity) = handle.await.unwrap().unwrap();
        assert_eq!(entity.partition_id, partition);
    }

    for name in names {
        let host = format!("{}.example.com", name.to_lowercase());
        let ctx = bind_host(store.as_ref(), &host).await;
        let page = store
            .list(&ctx, &resident, Pagination::new(50, 0))
            .await
            .unwrap();
        assert_eq!(page.total, 10);
        assert!(
            page.items
                .iter()
                .all(|e| e.fields["full_name"].as_str().unwrap().starts_with(name))
        );
    }
}

#[tokio::test]
async fn test_bound_context_carries_partition() {
    let (provisioner, acme, globex) = two_tenants().await;
    assert_eq!(acme.tenant_id().as_str(), "acme");
    assert_eq!(
        acme.current_partition(),
        &PartitionId::parse("tenant_acme").unwrap()
    );
    assert_ne!(acme.current_partition(), globex.current_partition());
    assert_eq!(acme.shared_partition(), provisioner.store().shared_partition());
}
