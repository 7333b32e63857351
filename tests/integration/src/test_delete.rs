//! Delete item tests.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use itemstack_model::StorageErrorCode;
    use itemstack_model::types::{Condition, DeleteItemRequest, ExpectedCondition};

    use crate::{create_fixture_table, full_item, key, provider, seed};

    #[tokio::test]
    async fn test_should_delete_item() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "delete").await;
        seed(&provider, &table_name, &[full_item(1, "1"), full_item(1, "2")]).await;

        provider
            .delete_item(&ctx, &DeleteItemRequest::new(&table_name, key(1, "1")))
            .await
            .unwrap();

        let remaining = provider
            .select_item(
                &ctx,
                &table_name,
                &HashMap::from([("id".to_owned(), Condition::eq(1_i64))]),
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(remaining, vec![full_item(1, "2")]);
    }

    #[tokio::test]
    async fn test_should_delete_absent_item_idempotently() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "delete_absent").await;
        let request = DeleteItemRequest::new(&table_name, key(9, "9"));

        provider.delete_item(&ctx, &request).await.unwrap();
        provider.delete_item(&ctx, &request).await.unwrap();
    }

    #[tokio::test]
    async fn test_should_require_full_key() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "delete_key").await;
        seed(&provider, &table_name, &[full_item(1, "1")]).await;

        let hash_only = HashMap::from([("id".to_owned(), Condition::eq(1_i64))]);
        let relational = HashMap::from([
            ("id".to_owned(), Condition::eq(1_i64)),
            ("range".to_owned(), Condition::le("1")),
        ]);
        let mut non_key = key(1, "1");
        non_key.insert("fstr".to_owned(), Condition::eq("dynamic"));

        for keys in [hash_only, relational, non_key] {
            let err = provider
                .delete_item(&ctx, &DeleteItemRequest::new(&table_name, keys))
                .await
                .unwrap_err();
            assert_eq!(err.code, StorageErrorCode::QueryError);
        }

        let items = provider
            .select_item(&ctx, &table_name, &key(1, "1"), None, None)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_should_reject_expected_conditions() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "delete_expected").await;
        seed(&provider, &table_name, &[full_item(1, "1")]).await;

        let request = DeleteItemRequest::new(&table_name, key(1, "1")).with_expected(
            HashMap::from([("str".to_owned(), ExpectedCondition::value("predefined"))]),
        );
        let err = provider.delete_item(&ctx, &request).await.unwrap_err();
        assert_eq!(err.code, StorageErrorCode::Unsupported);

        let items = provider
            .select_item(&ctx, &table_name, &key(1, "1"), None, None)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_should_fail_on_missing_table() {
        let provider = provider().await;
        let err = provider
            .delete_item(
                &provider.default_context(),
                &DeleteItemRequest::new("missing", key(1, "1")),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NotFound);
    }
}
