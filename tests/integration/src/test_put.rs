//! Put item tests: whole-item replace and type fidelity.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use itemstack_model::{AttributeValue, StorageErrorCode};

    use crate::{create_fixture_table, full_item, key, key_item, number, provider, seed};

    #[tokio::test]
    async fn test_should_round_trip_full_item() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "put").await;
        let item = full_item(1, "1");
        seed(&provider, &table_name, std::slice::from_ref(&item)).await;

        let items = provider
            .select_item(&ctx, &table_name, &key(1, "1"), None, None)
            .await
            .unwrap();
        assert_eq!(items, vec![item]);
    }

    #[tokio::test]
    async fn test_should_replace_existing_item() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "put_replace").await;
        seed(&provider, &table_name, &[full_item(1, "1")]).await;

        let mut replacement = key_item(1, "1");
        replacement.insert("numbr".to_owned(), AttributeValue::from(2_i64));
        replacement.insert("other".to_owned(), AttributeValue::from("new"));
        provider.put_item(&ctx, &table_name, &replacement).await.unwrap();

        let items = provider
            .select_item(&ctx, &table_name, &key(1, "1"), None, None)
            .await
            .unwrap();
        assert_eq!(items, vec![replacement]);
    }

    #[tokio::test]
    async fn test_should_keep_number_and_binary_fidelity() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "put_fidelity").await;

        let mut item = key_item(1, "1");
        for (name, value) in [
            ("numbr", AttributeValue::N(number("123456789012345678901234567890.000000001"))),
            ("fnum", AttributeValue::N(number("-1.5E-20"))),
            ("blb", AttributeValue::B(Bytes::from_static(&[0, 159, 146, 150]))),
            ("fblb", AttributeValue::B(Bytes::new())),
            ("fstr", AttributeValue::from("")),
            ("fsstr", AttributeValue::string_set(["", "[\"quoted\"]", "ünïcödé"])),
        ] {
            item.insert(name.to_owned(), value);
        }
        provider.put_item(&ctx, &table_name, &item).await.unwrap();

        let items = provider
            .select_item(&ctx, &table_name, &key(1, "1"), None, None)
            .await
            .unwrap();
        assert_eq!(items, vec![item]);
    }

    #[tokio::test]
    async fn test_should_reject_invalid_items() {
        let provider = provider().await;
        let ctx = provider.default_context();
        let table_name = create_fixture_table(&provider, "put_invalid").await;

        let mut missing_range = key_item(1, "1");
        missing_range.remove("range");

        let mut mistyped = key_item(1, "1");
        mistyped.insert("blb".to_owned(), AttributeValue::from("not bytes"));

        let mut empty_set = key_item(1, "1");
        empty_set.insert(
            "fsnum".to_owned(),
            AttributeValue::number_set(Vec::<itemstack_model::Number>::new()),
        );

        for (item, code) in [
            (missing_range, StorageErrorCode::QueryError),
            (mistyped, StorageErrorCode::EncodingError),
            (empty_set, StorageErrorCode::EncodingError),
        ] {
            let err = provider.put_item(&ctx, &table_name, &item).await.unwrap_err();
            assert_eq!(err.code, code, "{item:?}");
        }
    }
}
