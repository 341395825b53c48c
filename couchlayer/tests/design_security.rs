use couchlayer::{memory::InMemoryCouch, prelude::*, security::SYSTEM_ADMIN_ROLE};

async fn client() -> CouchClient<InMemoryCouch> {
    CouchClient::new(
        InMemoryCouch::builder()
            .database("recipes")
            .build()
            .await
            .unwrap(),
    )
}

fn by_cuisine() -> DesignDocument {
    DesignDocument::new("recipes")
        .with_language("javascript")
        .with_view(
            "by_cuisine",
            View::new("function (doc) { emit(doc.cuisine, 1); }").with_reduce(Reduce::Count),
        )
        .with_view("all", View::new("function (doc) { emit(doc._id, null); }"))
}

#[tokio::test]
async fn design_document_round_trip() {
    let client = client().await;
    let design = client.database("recipes").design_documents();

    let created = design.create(&by_cuisine()).await.unwrap();
    assert_eq!(created.id, "_design/recipes");

    let fetched = design.get("recipes").await.unwrap();
    assert_eq!(fetched.name, "recipes");
    assert_eq!(fetched.rev.as_ref(), Some(&created.rev));
    assert_eq!(fetched.views, by_cuisine().views);
    assert_eq!(fetched.views["all"].reduce, Reduce::None);

    let err = design.create(&by_cuisine()).await.unwrap_err();
    assert!(matches!(err, CouchError::AlreadyExists(_)));

    let mut changed = fetched.clone();
    changed.add_view(
        "totals",
        View::new("function (doc) { emit(doc.cuisine, doc.price); }").with_reduce(Reduce::Sum),
    );
    let updated = design.update(&changed, &created.rev).await.unwrap();

    let err = design.update(&changed, &created.rev).await.unwrap_err();
    assert!(matches!(err, CouchError::Validation(_) | CouchError::Conflict(_)));

    assert_eq!(design.list().await.unwrap(), vec!["_design/recipes"]);

    design.delete("recipes", &updated.rev, false).await.unwrap();
    assert!(design.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn design_document_without_name_is_rejected() {
    let client = client().await;

    let err = client
        .database("recipes")
        .design_documents()
        .create(&DesignDocument::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CouchError::Validation(_)));
}

#[tokio::test]
async fn security_document_round_trip() {
    let client = client().await;
    let security = client.database("recipes").security();

    let empty = security.get().await.unwrap();
    assert!(empty.admin_names().is_empty());
    assert!(empty.admin_roles().contains(SYSTEM_ADMIN_ROLE));

    let doc = SecurityDocument::new()
        .add_admin_name("alice")
        .add_member_roles(["cooks", "tasters"]);
    let ack = security.set(&doc).await.unwrap();
    assert!(ack.ok);

    let stored = security.get().await.unwrap();
    assert!(stored.admin_names().contains("alice"));
    assert!(stored.admin_roles().contains(SYSTEM_ADMIN_ROLE));
    assert_eq!(stored.member_roles().len(), 2);
}

#[tokio::test]
async fn security_of_missing_database_is_not_found() {
    let client = client().await;

    let err = client.database("missing").security().get().await.unwrap_err();

    assert!(matches!(err, CouchError::NotFound(_)));
}
