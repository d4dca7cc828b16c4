use shared::{
    domain::AttributeId,
    protocol::{AttributeGroupInput, GroupAttributeInput},
};
use storage::{FamilyDeletion, FamilyRecord, Storage};

#[tokio::test]
async fn family_create_update_delete_acceptance() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let groups = vec![AttributeGroupInput {
        name: "General".to_string(),
        column: Some(1),
        position: Some(1),
        custom_attributes: vec![GroupAttributeInput {
            id: AttributeId(1),
            position: Some(1),
        }],
    }];

    let family_id = storage
        .create_family(FamilyRecord {
            code: "lifecycle",
            name: "Lifecycle",
            attribute_groups: &groups,
        })
        .await
        .expect("create");
    assert_eq!(storage.count_families().await.expect("count"), 2);

    let created = storage
        .find_family(family_id)
        .await
        .expect("find")
        .expect("exists");

    storage
        .update_family(
            family_id,
            FamilyRecord {
                code: "lifecycle_v2",
                name: "Lifecycle v2",
                attribute_groups: &groups,
            },
        )
        .await
        .expect("update");
    let updated = storage
        .find_family_by_code("lifecycle_v2")
        .await
        .expect("find")
        .expect("renamed");
    assert_eq!(updated.id, family_id);
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.created_at, created.created_at);

    assert_eq!(
        storage.delete_family(family_id).await.expect("delete"),
        FamilyDeletion::Deleted
    );
    assert_eq!(storage.count_families().await.expect("count"), 1);
}
