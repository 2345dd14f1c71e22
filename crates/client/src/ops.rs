//! Embedded GraphQL documents, one per operation.

macro_rules! doc {
    ($name:ident, $file:literal) => {
        pub const $name: &str =
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/graphql/", $file));
    };
}

doc!(TRANSACTION_BY_ID, "TransactionById.graphql");
doc!(CATEGORY_BY_ID, "CategoryById.graphql");
doc!(TAG_BY_ID, "TagById.graphql");
doc!(RECURRING_BY_ID, "RecurringById.graphql");

doc!(TRANSACTIONS, "Transactions.graphql");
doc!(CATEGORIES, "Categories.graphql");
doc!(TAGS, "Tags.graphql");
doc!(RECURRINGS, "Recurrings.graphql");

doc!(EDIT_TRANSACTION, "EditTransaction.graphql");
doc!(EDIT_CATEGORY, "EditCategory.graphql");
doc!(EDIT_TAG, "EditTag.graphql");
doc!(EDIT_RECURRING, "EditRecurring.graphql");
