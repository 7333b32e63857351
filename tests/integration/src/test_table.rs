//! Table lifecycle tests.

#[cfg(test)]
mod tests {
    use itemstack_model::types::{AttributeDefinition, IndexDefinition, RequestContext, TableSchema};
    use itemstack_model::{AttributeType, StorageErrorCode};

    use crate::{create_fixture_table, fixture_schema, provider, test_table_name};

    #[tokio::test]
    async fn test_should_create_describe_and_delete_table() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "lifecycle").await;

        let described = provider.describe_table(&ctx, &table_name).await.unwrap();
        assert_eq!(described, fixture_schema(&table_name));
        assert_eq!(described.hash_key(), Some("id"));
        assert_eq!(described.range_key(), Some("range"));
        assert_eq!(
            described.index_on("indexed").map(|i| i.index_name.as_str()),
            Some("idx")
        );

        assert_eq!(provider.list_tables(&ctx).await.unwrap(), vec![table_name.clone()]);

        provider.delete_table(&ctx, &table_name).await.unwrap();
        assert!(provider.list_tables(&ctx).await.unwrap().is_empty());
        let err = provider.describe_table(&ctx, &table_name).await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_should_describe_hash_only_table() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = test_table_name("hash_only");
        let schema = TableSchema::new(
            &table_name,
            [
                AttributeDefinition::new("pk", AttributeType::String),
                AttributeDefinition::new("payload", AttributeType::Blob),
            ],
            ["pk"],
            [],
        );
        provider.create_table(&ctx, &schema).await.unwrap();

        let described = provider.describe_table(&ctx, &table_name).await.unwrap();
        assert_eq!(described, schema);
        assert!(described.range_key().is_none());
        assert!(described.index_definitions.is_empty());
    }

    #[tokio::test]
    async fn test_should_fail_to_create_existing_table() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "dup").await;

        let err = provider
            .create_table(&ctx, &fixture_schema(&table_name))
            .await
            .unwrap_err();
        assert_eq!(err.code, StorageErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn test_should_fail_on_missing_table() {
        let provider = provider().await;
        let ctx = provider.default_context();

        let err = provider.describe_table(&ctx, "missing").await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NotFound);
        let err = provider.delete_table(&ctx, "missing").await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NotFound);
        let err = provider
            .select_item(&ctx, "missing", &crate::key(1, "1"), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_should_reject_invalid_schemas() {
        let provider = provider().await;
        let ctx = provider.default_context();

        let undeclared_key = TableSchema::new(
            "undeclared_key",
            [AttributeDefinition::new("id", AttributeType::Number)],
            ["pk"],
            [],
        );
        let set_key = TableSchema::new(
            "set_key",
            [AttributeDefinition::new("id", AttributeType::StringSet)],
            ["id"],
            [],
        );
        let index_on_hash = TableSchema::new(
            "index_on_hash",
            [AttributeDefinition::new("id", AttributeType::Number)],
            ["id"],
            [IndexDefinition::new("by_id", "id")],
        );
        let bad_name = TableSchema::new(
            "bad-name",
            [AttributeDefinition::new("id", AttributeType::Number)],
            ["id"],
            [],
        );

        let reserved_index = TableSchema::new(
            "reserved_index",
            [
                AttributeDefinition::new("id", AttributeType::Number),
                AttributeDefinition::new("v", AttributeType::String),
            ],
            ["id"],
            [IndexDefinition::new("system_hash", "v")],
        );

        for schema in [undeclared_key, set_key, index_on_hash, bad_name, reserved_index] {
            let err = provider.create_table(&ctx, &schema).await.unwrap_err();
            assert_eq!(err.code, StorageErrorCode::SchemaError, "{}", schema.table_name);
        }
        assert!(provider.list_tables(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_should_create_tables_whose_joined_index_names_coincide() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let schema = |table: &str, index: &str| {
            TableSchema::new(
                table,
                [
                    AttributeDefinition::new("id", AttributeType::Number),
                    AttributeDefinition::new("v", AttributeType::String),
                ],
                ["id"],
                [IndexDefinition::new(index, "v")],
            )
        };
        let first = schema("a", "b_c");
        let second = schema("a_b", "c");

        provider.create_table(&ctx, &first).await.unwrap();
        provider.create_table(&ctx, &second).await.unwrap();

        assert_eq!(provider.list_tables(&ctx).await.unwrap(), vec!["a", "a_b"]);
        assert_eq!(provider.describe_table(&ctx, "a").await.unwrap(), first);
        assert_eq!(provider.describe_table(&ctx, "a_b").await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_should_create_index_named_like_another_tables_system_index() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "t").await;
        let lookalike = TableSchema::new(
            format!("{table_name}_system"),
            [
                AttributeDefinition::new("id", AttributeType::Number),
                AttributeDefinition::new("v", AttributeType::String),
            ],
            ["id"],
            [IndexDefinition::new("hash", "v")],
        );
        provider.create_table(&ctx, &lookalike).await.unwrap();
        assert_eq!(provider.list_tables(&ctx).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_should_keep_tenants_apart() {
        let provider = provider().await;
        let first = RequestContext::new("tenant_one");
        let second = RequestContext::new("tenant_two");
        let table_name = test_table_name("tenant");

        provider
            .create_table(&first, &fixture_schema(&table_name))
            .await
            .unwrap();

        assert!(provider.list_tables(&second).await.unwrap().is_empty());
        let err = provider.describe_table(&second, &table_name).await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NotFound);

        provider
            .create_table(&second, &fixture_schema(&table_name))
            .await
            .unwrap();
        assert_eq!(provider.list_tables(&first).await.unwrap(), vec![table_name]);
    }

    #[tokio::test]
    async fn test_should_page_through_tables() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let mut names = Vec::new();
        for _ in 0..5 {
            names.push(create_fixture_table(&provider, "page").await);
        }
        names.sort();

        let mut seen = Vec::new();
        let mut start: Option<String> = None;
        loop {
            let page = provider
                .list_tables_page(&ctx, start.as_deref(), Some(2))
                .await
                .unwrap();
            assert!(page.table_names.len() <= 2);
            seen.extend(page.table_names);
            match page.last_evaluated_table_name {
                Some(last) => start = Some(last),
                None => break,
            }
        }
        assert_eq!(seen, names);
    }
}
