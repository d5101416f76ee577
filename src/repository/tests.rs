//! Repository Integration Tests
//!
//! Tag registry and owner-tag links against an in-memory SQLite database.

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::config::TagsConfig;
    use crate::domain::{
        DomainError, Entity, SortDirection, Tag, TagBatch, TagReference, TagTranslation,
        TagValues, Taggable, TranslatableField, DEFAULT_LINK_NAME,
    };
    use crate::repository::tag::{
        TagLookupOperations, TagPositioningOperations, TagTranslationOperations,
    };
    use crate::repository::{Repository, SearchableRepository, TaggableQuery};
    use crate::TagStore;

    #[derive(Debug, Clone, PartialEq)]
    struct Post {
        id: i64,
        title: String,
    }

    impl Entity for Post {
        type Id = i64;

        fn id(&self) -> i64 {
            self.id
        }
    }

    impl Taggable for Post {
        const MORPH_TYPE: &'static str = "posts";
        const TABLE: &'static str = "posts";
    }

    async fn setup_store(config: TagsConfig) -> TagStore {
        // Use in-memory database for tests
        let store = TagStore::open(Path::new(":memory:"), config)
            .await
            .expect("Failed to init test DB");
        let conn = store.db_state.connection();
        let guard = conn.lock().await;
        guard
            .as_ref()
            .unwrap()
            .execute(
                "CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT NOT NULL)",
                [],
            )
            .expect("Failed to create posts");
        drop(guard);
        store
    }

    async fn setup_test_db() -> TagStore {
        setup_store(TagsConfig::default()).await
    }

    async fn create_post(store: &TagStore, title: &str) -> Post {
        let conn = store.db_state.connection();
        let guard = conn.lock().await;
        let conn = guard.as_ref().unwrap();
        conn.execute("INSERT INTO posts (title) VALUES (?1)", [title])
            .expect("Failed to create post");
        Post {
            id: conn.last_insert_rowid(),
            title: title.to_string(),
        }
    }

    async fn tag_names(store: &TagStore, post: &Post) -> Vec<String> {
        store
            .taggables
            .tags(post, DEFAULT_LINK_NAME)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect()
    }

    async fn attach(store: &TagStore, post: &Post, names: &[&str]) {
        store
            .taggables
            .attach_tags(post, names, None, DEFAULT_LINK_NAME)
            .await
            .expect("Attach failed");
    }

    fn new_tag(name: &str, slug: &str, tag_type: &str) -> Tag {
        let mut tag = Tag::new(0, name).with_type(tag_type);
        tag.slug = slug.to_string();
        tag
    }

    // ========================
    // Tag registry
    // ========================

    #[tokio::test]
    async fn test_tag_can_be_created() {
        let store = setup_test_db().await;

        let created = store.tags.create(&new_tag("Laravel", "laravel", "framework")).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.order_column, 1);
        assert!(store.tags.exists(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_name_misses_then_find_or_create_is_idempotent() {
        let store = setup_test_db().await;

        let missing = store.tags.find_by_name("Test tag 1", None, None).await.unwrap();
        assert!(missing.is_none());

        let first = store.tags.find_or_create("Test tag 1", None, None).await.unwrap();
        let second = store.tags.find_or_create("Test tag 1", None, None).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.slug, "Test tag 1");
        assert_eq!(store.tags.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_name_is_scoped_to_type() {
        let store = setup_test_db().await;
        let typed = store.tags.find_or_create("Rust", Some("lang"), None).await.unwrap();

        assert!(store.tags.find_by_name("Rust", None, None).await.unwrap().is_none());
        let found = store.tags.find_by_name("Rust", Some("lang"), None).await.unwrap();
        assert_eq!(found.map(|t| t.id), Some(typed.id));

        let untyped = store.tags.find_or_create("Rust", None, None).await.unwrap();
        assert_ne!(untyped.id, typed.id);
    }

    #[tokio::test]
    async fn test_find_by_name_any_type_matches_name_and_slug() {
        let store = setup_test_db().await;
        store.tags.find_or_create("Test tag 1", Some("post_category"), None).await.unwrap();
        store.tags.create(&new_tag("Tag 2", "test-tag", "topic")).await.unwrap();

        let by_name = store.tags.find_by_name_any_type("Test tag 1", None).await.unwrap();
        assert_eq!(by_name.len(), 1);

        let by_slug = store.tags.find_by_name_any_type("test-tag", None).await.unwrap();
        assert_eq!(by_slug.len(), 1);
        assert_eq!(by_slug[0].name, "Tag 2");
    }

    #[tokio::test]
    async fn test_find_or_create_batch_keeps_input_shape() {
        let store = setup_test_db().await;
        let existing = store.tags.find_or_create("Existing", None, None).await.unwrap();

        let one = store.tags.find_or_create_batch("Solo".into(), None, None).await.unwrap();
        assert!(matches!(one, TagBatch::One(ref tag) if tag.name == "Solo"));

        let values: TagValues = vec![
            TagReference::from("New"),
            TagReference::from(&existing),
            TagReference::from(existing.id),
        ]
        .into();
        let many = store.tags.find_or_create_batch(values, None, None).await.unwrap();
        let names: Vec<String> = many.into_vec().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["New", "Existing", "Existing"]);
    }

    #[tokio::test]
    async fn test_find_or_create_batch_unknown_id_rolls_back() {
        let store = setup_test_db().await;

        let values: TagValues =
            vec![TagReference::from("Fresh"), TagReference::from(999_i64)].into();
        let result = store.tags.find_or_create_batch(values, None, None).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));

        assert!(store.tags.find_by_name("Fresh", None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_types_and_list_by_type() {
        let store = setup_test_db().await;
        store.tags.find_or_create("a", Some("category"), None).await.unwrap();
        store.tags.find_or_create("b", Some("category"), None).await.unwrap();
        store.tags.find_or_create("c", Some("topic"), None).await.unwrap();
        store.tags.find_or_create("d", None, None).await.unwrap();

        let types = store.tags.list_types().await.unwrap();
        assert_eq!(types, vec![None, Some("category".to_string()), Some("topic".to_string())]);

        let asc: Vec<String> = store
            .tags
            .list_by_type("category", SortDirection::Asc)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(asc, vec!["a", "b"]);

        let desc = store.tags.list_by_type("category", SortDirection::Desc).await.unwrap();
        assert_eq!(desc[0].name, "b");
    }

    #[tokio::test]
    async fn test_search_matches_substring() {
        let store = setup_test_db().await;
        store.tags.find_or_create("Rustacean", None, None).await.unwrap();
        store.tags.find_or_create("Gopher", None, None).await.unwrap();
        store.tags.find_or_create("100%", None, None).await.unwrap();

        let found = store.tags.search("stac").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Rustacean");

        let literal = store.tags.search("%").await.unwrap();
        assert_eq!(literal.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_missing_update() {
        let store = setup_test_db().await;
        let mut tag = store.tags.find_or_create("Old", None, None).await.unwrap();

        tag.name = "New".to_string();
        let updated = store.tags.update(&tag).await.unwrap();
        assert_eq!(updated.name, "New");

        let ghost = Tag::new(404, "Ghost");
        assert!(matches!(store.tags.update(&ghost).await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_move_tag_within_type() {
        let store = setup_test_db().await;
        let a = store.tags.find_or_create("a", Some("t"), None).await.unwrap();
        store.tags.find_or_create("b", Some("t"), None).await.unwrap();
        let c = store.tags.find_or_create("c", Some("t"), None).await.unwrap();
        let other = store.tags.find_or_create("x", Some("u"), None).await.unwrap();

        store.tags.move_tag(c.id, 1).await.unwrap();
        let names: Vec<String> = store
            .tags
            .list_by_type("t", SortDirection::Asc)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);

        let untouched = store.tags.find_by_id(other.id).await.unwrap().unwrap();
        assert_eq!(untouched.order_column, 1);

        store.tags.set_new_order(&[a.id, c.id], 10).await.unwrap();
        store.tags.reindex_tags().await.unwrap();
        let last = store.tags.list_by_type("t", SortDirection::Asc).await.unwrap();
        assert_eq!(last.iter().map(|t| t.order_column).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(last[2].id, c.id);
    }

    #[tokio::test]
    async fn test_missing_tag_move_is_not_found() {
        let store = setup_test_db().await;
        assert!(matches!(store.tags.move_tag(77, 1).await, Err(DomainError::NotFound(_))));
    }

    // ========================
    // Translations
    // ========================

    #[tokio::test]
    async fn test_tag_can_be_translated() {
        let store = setup_store(TagsConfig::default().with_translations(true)).await;
        let post = create_post(&store, "Title").await;
        attach(&store, &post, &["Test tag 1"]).await;
        let tag = store.taggables.tags(&post, DEFAULT_LINK_NAME).await.unwrap().remove(0);

        store
            .tags
            .set_translation(tag.id, TranslatableField::Name, "zh_TW", "測試標籤 1")
            .await
            .unwrap();

        let tag = store.taggables.tags(&post, DEFAULT_LINK_NAME).await.unwrap().remove(0);
        let zh = store.in_locale("zh_TW");
        assert_eq!(zh.tags.resolved_name(&tag, None), "測試標籤 1");
        assert_eq!(store.tags.resolved_name(&tag, None), "Test tag 1");
        assert_eq!(tag.resolved_name("en", store.config()), "Test tag 1");

        let found = store.tags.find_by_name("測試標籤 1", None, Some("zh_TW")).await.unwrap();
        assert_eq!(found.map(|t| t.id), Some(tag.id));
        let other_locale = store.tags.find_by_name("測試標籤 1", None, Some("fr")).await.unwrap();
        assert!(other_locale.is_none());
    }

    #[tokio::test]
    async fn test_creating_in_other_locale_stores_translation() {
        let store = setup_store(TagsConfig::default().with_translations(true)).await;
        let zh = store.in_locale("zh_TW");

        let tag = zh.tags.find_or_create("標籤", None, None).await.unwrap();
        assert_eq!(tag.name, "標籤");
        assert_eq!(tag.slug, "標籤");

        let translations = store.tags.translations_for(tag.id).await.unwrap();
        assert_eq!(translations.len(), 1);
        assert_eq!(translations[0].locale, "zh_TW");

        let in_default = store.tags.find_or_create("Plain", None, None).await.unwrap();
        assert!(store.tags.translations_for(in_default.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_translations_rejected_when_disabled() {
        let store = setup_test_db().await;
        let tag = store.tags.find_or_create("Plain", None, None).await.unwrap();

        let result = store
            .tags
            .set_translation(tag.id, TranslatableField::Name, "de", "Einfach")
            .await;
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));

        let renamed = store.tags.rename(tag.id, "Simple", None).await.unwrap();
        assert_eq!(renamed.name, "Simple");
    }

    #[tokio::test]
    async fn test_rename_and_forget_translation() {
        let store = setup_store(TagsConfig::default().with_translations(true)).await;
        let tag = store.tags.find_or_create("Color", None, None).await.unwrap();

        let renamed = store.tags.rename(tag.id, "Colour", Some("en_GB")).await.unwrap();
        assert_eq!(renamed.name, "Color");
        assert_eq!(renamed.translation(TranslatableField::Name, "en_GB"), Some("Colour"));

        let forget = || store.tags.forget_translation(tag.id, TranslatableField::Name, "en_GB");
        assert!(forget().await.unwrap());
        assert!(!forget().await.unwrap());
    }

    #[tokio::test]
    async fn test_default_locale_translation_does_not_shadow_name() {
        let store = setup_store(TagsConfig::default().with_translations(true)).await;
        let mut tag = Tag::new(0, "Base");
        tag.translations.push(TagTranslation {
            field: TranslatableField::Name,
            locale: "en".to_string(),
            value: "Shadow".to_string(),
        });
        tag.translations.push(TagTranslation {
            field: TranslatableField::Name,
            locale: "fr".to_string(),
            value: "Base fr".to_string(),
        });

        let created = store.tags.create(&tag).await.unwrap();
        assert_eq!(created.translations.len(), 1);

        let loaded = store.tags.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(store.tags.resolved_name(&loaded, Some("en")), "Base");
        assert_eq!(store.tags.resolved_name(&loaded, Some("fr")), "Base fr");

        let stored = store.tags.translations_for(created.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].locale, "fr");
    }

    #[tokio::test]
    async fn test_list_loads_translations_for_many_tags() {
        let store = setup_store(TagsConfig::default().with_translations(true)).await;
        {
            let conn = store.db_state.connection();
            let guard = conn.lock().await;
            guard
                .as_ref()
                .unwrap()
                .execute_batch(
                    "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 40000)
                     INSERT INTO tags (name, slug, order_column)
                     SELECT 'Bulk ' || i, 'bulk-' || i, i FROM n;
                     INSERT INTO tag_translations (tag_id, field, locale, value)
                     SELECT id, 'name', 'fr', name || ' fr' FROM tags;",
                )
                .unwrap();
        }

        let tags = store.tags.list().await.unwrap();
        assert_eq!(tags.len(), 40000);
        assert!(tags.iter().all(|t| t.translations.len() == 1));
        assert_eq!(tags[0].resolved_name("fr", store.config()), "Bulk 1 fr");
    }

    // ========================
    // Attach / detach / sync
    // ========================

    #[tokio::test]
    async fn test_tag_can_be_created_through_post() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;

        attach(&store, &post, &["Test tag 1"]).await;
        assert_eq!(tag_names(&store, &post).await, vec!["Test tag 1"]);
    }

    #[tokio::test]
    async fn test_attach_is_idempotent_and_deduplicates() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;

        attach(&store, &post, &["Test tag 1", "Test tag 2", "Test tag 1"]).await;
        attach(&store, &post, &["Test tag 2", "Test tag 3"]).await;

        assert_eq!(tag_names(&store, &post).await, vec!["Test tag 1", "Test tag 2", "Test tag 3"]);
        assert_eq!(store.taggables.links(&post, DEFAULT_LINK_NAME).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_attach_with_unknown_id_leaves_nothing_behind() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;

        let values: TagValues =
            vec![TagReference::from("Fresh"), TagReference::from(999_i64)].into();
        let result = store.taggables.attach_tags(&post, values, None, DEFAULT_LINK_NAME).await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert!(tag_names(&store, &post).await.is_empty());
        assert!(store.tags.find_by_name("Fresh", None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tag_can_be_detached() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;
        let tag = store.taggables.attach_tag(&post, "Test tag 1", None).await.unwrap();

        assert_eq!(store.taggables.detach_tag(&post, &tag, None).await.unwrap(), 1);
        assert!(tag_names(&store, &post).await.is_empty());

        // already detached
        assert_eq!(store.taggables.detach_tag(&post, &tag, None).await.unwrap(), 0);
        assert_eq!(store.taggables.detach_tag(&post, "Never attached", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_multiple_tags_can_be_detached_by_tag_id_and_name() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;
        attach(&store, &post, &["Test tag 1", "Test tag 2", "Test tag 3", "Keep"]).await;
        let tags = store.taggables.tags(&post, DEFAULT_LINK_NAME).await.unwrap();

        let values: TagValues = vec![
            TagReference::from(&tags[0]),
            TagReference::from(tags[1].id),
            TagReference::from("Test tag 3"),
        ]
        .into();
        let removed = store
            .taggables
            .detach_tags(&post, values, None, DEFAULT_LINK_NAME)
            .await
            .unwrap();

        assert_eq!(removed, 3);
        assert_eq!(tag_names(&store, &post).await, vec!["Keep"]);
    }

    #[tokio::test]
    async fn test_multiple_tags_can_be_synced() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;
        attach(&store, &post, &["Test tag 1", "Test tag 2", "Test tag 3"]).await;

        let changes = store
            .taggables
            .sync_tags(&post, ["Test tag 4", "Test tag 5"], None, DEFAULT_LINK_NAME)
            .await
            .unwrap();

        assert_eq!(changes.attached.len(), 2);
        assert_eq!(changes.detached.len(), 3);
        assert_eq!(tag_names(&store, &post).await, vec!["Test tag 4", "Test tag 5"]);
    }

    #[tokio::test]
    async fn test_multiple_tags_can_be_synced_with_type() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;
        attach(&store, &post, &["Test tag 1", "Test tag 2", "Test tag 3"]).await;

        store
            .taggables
            .sync_tags(
                &post,
                ["Test tag 4", "Test tag 5"],
                Some("post_category"),
                DEFAULT_LINK_NAME,
            )
            .await
            .unwrap();

        let tags = store.taggables.tags(&post, DEFAULT_LINK_NAME).await.unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t.tag_type.as_deref() == Some("post_category")));
    }

    #[tokio::test]
    async fn test_second_sync_wins_and_empty_sync_clears() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;

        store.taggables.sync_tags(&post, ["a", "b", "c"], None, DEFAULT_LINK_NAME).await.unwrap();
        let changes =
            store.taggables.sync_tags(&post, ["c", "d"], None, DEFAULT_LINK_NAME).await.unwrap();
        assert_eq!(tag_names(&store, &post).await, vec!["c", "d"]);
        assert_eq!(changes.detached.len(), 2);

        let unchanged =
            store.taggables.sync_tags(&post, ["d", "c"], None, DEFAULT_LINK_NAME).await.unwrap();
        assert!(unchanged.is_empty());

        store
            .taggables
            .sync_tags(&post, Vec::<&str>::new(), None, DEFAULT_LINK_NAME)
            .await
            .unwrap();
        assert!(tag_names(&store, &post).await.is_empty());
    }

    #[tokio::test]
    async fn test_sync_keeps_pivot_data_of_unchanged_links() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;
        let kept = store.taggables.attach_tag(&post, "kept", None).await.unwrap();
        attach(&store, &post, &["dropped"]).await;

        assert!(store
            .taggables
            .set_link_type(&post, kept.id, Some("featured"), DEFAULT_LINK_NAME)
            .await
            .unwrap());

        store.taggables.sync_tags(&post, ["kept", "added"], None, DEFAULT_LINK_NAME).await.unwrap();

        let links = store.taggables.links(&post, DEFAULT_LINK_NAME).await.unwrap();
        assert_eq!(links.len(), 2);
        let kept_link = links.iter().find(|l| l.tag_id == kept.id).unwrap();
        assert_eq!(kept_link.link_type.as_deref(), Some("featured"));
        assert_eq!(kept_link.taggable_type, "posts");
    }

    #[tokio::test]
    async fn test_sync_with_type_leaves_other_types() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;
        attach(&store, &post, &["plain"]).await;
        store
            .taggables
            .attach_tags(&post, ["red", "blue"], Some("color"), DEFAULT_LINK_NAME)
            .await
            .unwrap();

        store
            .taggables
            .sync_tags_with_type(&post, ["green"], "color", DEFAULT_LINK_NAME)
            .await
            .unwrap();

        let colors: Vec<String> = store
            .taggables
            .tags_with_type(&post, "color", DEFAULT_LINK_NAME)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(colors, vec!["green"]);
        assert!(store.taggables.has_tag(&post, "plain", None, DEFAULT_LINK_NAME).await.unwrap());
    }

    #[tokio::test]
    async fn test_link_names_are_independent() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;
        attach(&store, &post, &["Rust"]).await;
        store.taggables.attach_tags(&post, ["News"], None, "categories").await.unwrap();

        assert_eq!(tag_names(&store, &post).await, vec!["Rust"]);
        store
            .taggables
            .sync_tags(&post, Vec::<&str>::new(), None, DEFAULT_LINK_NAME)
            .await
            .unwrap();

        let categories = store.taggables.tags(&post, "categories").await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "News");
        assert!(!store.taggables.has_tag(&post, "News", None, DEFAULT_LINK_NAME).await.unwrap());
        assert!(store.taggables.has_tag(&post, "News", None, "categories").await.unwrap());

        let query = TaggableQuery::<Post>::new()
            .on_link("categories")
            .with_all_tags(["News"], None);
        assert_eq!(store.taggables.owner_ids(&query).await.unwrap(), vec![post.id]);
    }

    #[tokio::test]
    async fn test_deleting_tag_removes_links() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;
        let tag = store.taggables.attach_tag(&post, "Temporary", None).await.unwrap();

        store.tags.delete(tag.id).await.unwrap();
        assert!(tag_names(&store, &post).await.is_empty());
        assert!(store.tags.find_by_id(tag.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attaching_deleted_tag_is_not_found() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Title").await;
        let tag = store.tags.find_or_create("Gone", None, None).await.unwrap();
        store.tags.delete(tag.id).await.unwrap();

        let result = store
            .taggables
            .attach_tags(&post, vec![tag.clone()], None, DEFAULT_LINK_NAME)
            .await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));

        let synced = store.taggables.sync_tags(&post, tag, None, DEFAULT_LINK_NAME).await;
        assert!(matches!(synced, Err(DomainError::NotFound(_))));
        assert!(tag_names(&store, &post).await.is_empty());
    }

    // ========================
    // Owner queries
    // ========================

    async fn two_posts(store: &TagStore) -> (Post, Post) {
        let post1 = create_post(store, "Post 1").await;
        attach(store, &post1, &["Tag1", "Tag2", "Tag3"]).await;
        let post2 = create_post(store, "Post 2").await;
        attach(store, &post2, &["Tag1", "Tag4", "Tag5"]).await;
        (post1, post2)
    }

    #[tokio::test]
    async fn test_with_all_tags_requires_every_tag() {
        let store = setup_test_db().await;
        let (post1, post2) = two_posts(&store).await;

        let both = TaggableQuery::<Post>::new().with_all_tags(["Tag1", "Tag2"], None);
        assert_eq!(store.taggables.owner_ids(&both).await.unwrap(), vec![post1.id]);

        let one = TaggableQuery::<Post>::new().with_all_tags(["Tag1"], None);
        assert_eq!(store.taggables.owner_ids(&one).await.unwrap(), vec![post1.id, post2.id]);
    }

    #[tokio::test]
    async fn test_with_all_tags_drops_unresolved_names() {
        let store = setup_test_db().await;
        let (post1, post2) = two_posts(&store).await;
        let untagged = create_post(&store, "Untagged").await;

        let query = TaggableQuery::<Post>::new().with_all_tags(["Tag2", "Unknown"], None);
        assert_eq!(store.taggables.owner_ids(&query).await.unwrap(), vec![post1.id]);

        let vacuous = TaggableQuery::<Post>::new().with_all_tags(["Unknown"], None);
        assert_eq!(
            store.taggables.owner_ids(&vacuous).await.unwrap(),
            vec![post1.id, post2.id, untagged.id]
        );

        // typed lookup does not see untyped tags
        let typed = TaggableQuery::<Post>::new().with_all_tags(["Tag2"], Some("category"));
        assert_eq!(store.taggables.owner_ids(&typed).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_with_any_tags() {
        let store = setup_test_db().await;
        let (post1, post2) = two_posts(&store).await;

        let query = TaggableQuery::<Post>::new().with_any_tags(["Tag2", "Tag4"], None);
        assert_eq!(store.taggables.owner_ids(&query).await.unwrap(), vec![post1.id, post2.id]);

        let only = TaggableQuery::<Post>::new().with_any_tags(["Tag5"], None);
        assert_eq!(store.taggables.owner_ids(&only).await.unwrap(), vec![post2.id]);

        let none = TaggableQuery::<Post>::new().with_any_tags(["Unknown"], None);
        assert!(store.taggables.owner_ids(&none).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_without_tags() {
        let store = setup_test_db().await;
        let (_, post2) = two_posts(&store).await;
        let post3 = create_post(&store, "Post 3").await;
        attach(&store, &post3, &["Tag1", "Tag6", "Tag7"]).await;

        let query = TaggableQuery::<Post>::new().without_tags(["Tag2", "Tag3"], None);
        assert_eq!(store.taggables.owner_ids(&query).await.unwrap(), vec![post2.id, post3.id]);
    }

    #[tokio::test]
    async fn test_filters_combine() {
        let store = setup_test_db().await;
        let (_, post2) = two_posts(&store).await;

        let query = TaggableQuery::<Post>::new()
            .with_all_tags(["Tag1"], None)
            .without_tags(["Tag3"], None);
        assert_eq!(store.taggables.owner_ids(&query).await.unwrap(), vec![post2.id]);
    }

    #[tokio::test]
    async fn test_with_all_tags_of_any_type() {
        let store = setup_test_db().await;
        let tag1 = store.tags.create(&new_tag("Tag 1", "tag_1", "category")).await.unwrap();
        let tag2 = store.tags.create(&new_tag("Tag 2", "tag_2", "category")).await.unwrap();
        let tag3 = store.tags.create(&new_tag("Tag 3", "tag_3", "category")).await.unwrap();

        let post1 = create_post(&store, "Post 1").await;
        let post2 = create_post(&store, "Post 2").await;
        let post3 = create_post(&store, "Post 3").await;
        let attach_pair = |a: &Tag, b: &Tag| vec![a.clone(), b.clone()];
        for (post, tags) in [
            (&post1, attach_pair(&tag1, &tag2)),
            (&post2, attach_pair(&tag1, &tag3)),
            (&post3, attach_pair(&tag2, &tag3)),
        ] {
            store.taggables.attach_tags(post, tags, None, DEFAULT_LINK_NAME).await.unwrap();
        }

        let query = TaggableQuery::<Post>::new()
            .with_all_tags_of_any_type(vec![tag1.clone(), tag2.clone()]);
        assert_eq!(store.taggables.owner_ids(&query).await.unwrap(), vec![post1.id]);

        let by_name = TaggableQuery::<Post>::new().with_all_tags_of_any_type(["Tag 3", "tag_2"]);
        assert_eq!(store.taggables.owner_ids(&by_name).await.unwrap(), vec![post3.id]);

        let any = TaggableQuery::<Post>::new().with_any_tags_of_any_type(["tag_3"]);
        assert_eq!(store.taggables.owner_ids(&any).await.unwrap(), vec![post2.id, post3.id]);
    }

    #[tokio::test]
    async fn test_filters_accept_many_tags() {
        let store = setup_test_db().await;
        let post1 = create_post(&store, "Post 1").await;
        let post2 = create_post(&store, "Post 2").await;
        let post3 = create_post(&store, "Post 3").await;
        {
            let conn = store.db_state.connection();
            let guard = conn.lock().await;
            let conn = guard.as_ref().unwrap();
            conn.execute_batch(
                "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 40000)
                 INSERT INTO tags (name, slug, order_column)
                 SELECT 'Bulk ' || i, 'bulk-' || i, i FROM n;",
            )
            .unwrap();
            conn.execute(
                "INSERT INTO taggables (tag_id, taggable_type, taggable_id)
                 SELECT id, 'posts', ?1 FROM tags",
                [post1.id],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO taggables (tag_id, taggable_type, taggable_id)
                 VALUES (1, 'posts', ?1)",
                [post2.id],
            )
            .unwrap();
        }
        let ids: Vec<i64> = (1..=40000).collect();

        let all = TaggableQuery::<Post>::new().with_all_tags(ids.clone(), None);
        assert_eq!(store.taggables.owner_ids(&all).await.unwrap(), vec![post1.id]);

        let any = TaggableQuery::<Post>::new().with_any_tags(ids.clone(), None);
        assert_eq!(store.taggables.owner_ids(&any).await.unwrap(), vec![post1.id, post2.id]);

        let none = TaggableQuery::<Post>::new().without_tags(ids, None);
        assert_eq!(store.taggables.owner_ids(&none).await.unwrap(), vec![post3.id]);
    }

    #[tokio::test]
    async fn test_compiled_filter_embeds_in_caller_query() {
        let store = setup_test_db().await;
        let (post1, _) = two_posts(&store).await;
        create_post(&store, "Draft").await;

        let query = TaggableQuery::<Post>::new().with_any_tags(["Tag3"], None);
        let filter = store.taggables.compile(&query).await.unwrap();

        let conn = store.db_state.connection();
        let guard = conn.lock().await;
        let conn = guard.as_ref().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT title FROM posts WHERE title LIKE 'Post%' AND {}",
                filter.sql
            ))
            .unwrap();
        let titles: Vec<String> = stmt
            .query_map(rusqlite::params_from_iter(filter.params.iter()), |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(titles, vec![post1.title]);
    }

    #[tokio::test]
    async fn test_empty_query_matches_everything() {
        let store = setup_test_db().await;
        let post = create_post(&store, "Alone").await;

        let filter = store.taggables.compile(&TaggableQuery::<Post>::new()).await.unwrap();
        assert_eq!(filter.sql, "1");
        assert_eq!(
            store.taggables.owner_ids(&TaggableQuery::<Post>::new()).await.unwrap(),
            vec![post.id]
        );
    }

    #[tokio::test]
    async fn test_closed_store_reports_not_initialized() {
        let store = setup_test_db().await;
        store.db_state.close().await;

        let result = store.tags.find_by_name("any", None, None).await;
        assert!(matches!(result, Err(DomainError::Internal(_))));
    }
}
