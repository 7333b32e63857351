//! Update tests: PUT and DELETE actions on predefined and dynamic attributes.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bytes::Bytes;
    use futures::future::try_join_all;
    use itemstack_core::StorageProvider;
    use itemstack_model::types::{Condition, UpdateItemAction};
    use itemstack_model::{AttributeValue, Item, StorageErrorCode};

    use crate::{create_fixture_table, full_item, key, number, provider};

    fn actions(
        pairs: impl IntoIterator<Item = (&'static str, UpdateItemAction)>,
    ) -> HashMap<String, UpdateItemAction> {
        pairs
            .into_iter()
            .map(|(name, a)| (name.to_owned(), a))
            .collect()
    }

    async fn fetch(provider: &StorageProvider, table_name: &str, id: i64, range: &str) -> Option<Item> {
        provider
            .select_item(&provider.default_context(), table_name, &key(id, range), None, None)
            .await
            .unwrap()
            .pop()
    }

    #[tokio::test]
    async fn test_should_put_every_attribute_type() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "update_put").await;
        let expected = full_item(1, "1");

        let puts: HashMap<String, UpdateItemAction> = expected
            .iter()
            .filter(|(name, _)| name.as_str() != "id" && name.as_str() != "range")
            .map(|(name, value)| (name.clone(), UpdateItemAction::put(value.clone())))
            .collect();
        provider
            .update_item(&ctx, &table_name, &key(1, "1"), &puts)
            .await
            .unwrap();

        let item = fetch(&provider, &table_name, 1, "1").await.unwrap();
        assert_eq!(item, expected);
    }

    #[tokio::test]
    async fn test_should_merge_successive_updates() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "update_merge").await;

        provider
            .update_item(
                &ctx,
                &table_name,
                &key(1, "1"),
                &actions([("str", UpdateItemAction::put("first")), ("fstr", UpdateItemAction::put("a"))]),
            )
            .await
            .unwrap();
        provider
            .update_item(
                &ctx,
                &table_name,
                &key(1, "1"),
                &actions([("str", UpdateItemAction::put("second")), ("fnum", UpdateItemAction::put(5_i64))]),
            )
            .await
            .unwrap();

        let item = fetch(&provider, &table_name, 1, "1").await.unwrap();
        assert_eq!(item.get("str"), Some(&AttributeValue::from("second")));
        assert_eq!(item.get("fstr"), Some(&AttributeValue::from("a")));
        assert_eq!(item.get("fnum"), Some(&AttributeValue::from(5_i64)));
        assert_eq!(item.len(), 5);
    }

    #[tokio::test]
    async fn test_should_change_dynamic_attribute_type() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "update_retype").await;

        for value in [
            AttributeValue::from("text"),
            AttributeValue::N(number("-0.001")),
            AttributeValue::blob_set([Bytes::from_static(b"\x00")]),
        ] {
            provider
                .update_item(
                    &ctx,
                    &table_name,
                    &key(1, "1"),
                    &actions([("dyn", UpdateItemAction::put(value.clone()))]),
                )
                .await
                .unwrap();
            let item = fetch(&provider, &table_name, 1, "1").await.unwrap();
            assert_eq!(item.get("dyn"), Some(&value));
        }
    }

    #[tokio::test]
    async fn test_should_delete_attributes() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "update_delete").await;
        crate::seed(&provider, &table_name, &[full_item(1, "1")]).await;

        provider
            .update_item(
                &ctx,
                &table_name,
                &key(1, "1"),
                &actions([
                    ("str", UpdateItemAction::delete()),
                    ("set_blob", UpdateItemAction::delete()),
                    ("fstr", UpdateItemAction::delete()),
                    ("fsnum", UpdateItemAction::delete()),
                    ("never_set", UpdateItemAction::delete()),
                ]),
            )
            .await
            .unwrap();

        let mut expected = full_item(1, "1");
        for name in ["str", "set_blob", "fstr", "fsnum"] {
            expected.remove(name);
        }
        let item = fetch(&provider, &table_name, 1, "1").await.unwrap();
        assert_eq!(item, expected);
    }

    #[tokio::test]
    async fn test_should_upsert_key_only_item() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "update_upsert").await;

        provider
            .update_item(&ctx, &table_name, &key(7, "x"), &HashMap::new())
            .await
            .unwrap();

        let item = fetch(&provider, &table_name, 7, "x").await.unwrap();
        assert_eq!(item, crate::key_item(7, "x"));
    }

    #[tokio::test]
    async fn test_should_reject_invalid_updates() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "update_invalid").await;

        let partial_key = HashMap::from([("id".to_owned(), Condition::eq(1_i64))]);
        let relational_key = HashMap::from([
            ("id".to_owned(), Condition::eq(1_i64)),
            ("range".to_owned(), Condition::gt("1")),
        ]);
        let mut extra_key = key(1, "1");
        extra_key.insert("str".to_owned(), Condition::eq("x"));
        let put_str = actions([("str", UpdateItemAction::put("x"))]);

        let cases = [
            (partial_key, put_str.clone(), StorageErrorCode::QueryError),
            (relational_key, put_str.clone(), StorageErrorCode::QueryError),
            (extra_key, put_str, StorageErrorCode::QueryError),
            (
                key(1, "1"),
                actions([("range", UpdateItemAction::put("2"))]),
                StorageErrorCode::QueryError,
            ),
            (
                key(1, "1"),
                actions([("numbr", UpdateItemAction::put("not a number"))]),
                StorageErrorCode::EncodingError,
            ),
            (
                key(1, "1"),
                actions([("fsstr", UpdateItemAction::put(AttributeValue::string_set(Vec::<String>::new())))]),
                StorageErrorCode::EncodingError,
            ),
        ];
        for (keys, actions, code) in cases {
            let err = provider
                .update_item(&ctx, &table_name, &keys, &actions)
                .await
                .unwrap_err();
            assert_eq!(err.code, code, "{keys:?} {actions:?}");
        }
        assert!(fetch(&provider, &table_name, 1, "1").await.is_none());
    }

    #[tokio::test]
    async fn test_should_apply_concurrent_updates_to_distinct_attributes() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "update_concurrent").await;
        let keys = key(1, "1");

        let names: Vec<String> = (0..16).map(|i| format!("attr_{i}")).collect();
        let updates = names.iter().zip(0_i64..).map(|(name, i)| {
            let actions = HashMap::from([(name.clone(), UpdateItemAction::put(i))]);
            let (provider, ctx, table_name, keys) = (&provider, &ctx, &table_name, &keys);
            async move { provider.update_item(ctx, table_name, keys, &actions).await }
        });
        try_join_all(updates).await.unwrap();

        let item = fetch(&provider, &table_name, 1, "1").await.unwrap();
        for (name, i) in names.iter().zip(0_i64..) {
            assert_eq!(item.get(name), Some(&AttributeValue::from(i)), "{name}");
        }
    }
}
