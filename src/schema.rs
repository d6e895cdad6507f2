// Diesel table definitions.
// Kept in sync by hand with `DbContext::init_schema`.

diesel::table! {
    urls (id) {
        id -> Integer,
        url -> Text,
    }
}

diesel::table! {
    manga (id) {
        id -> Integer,
        title -> Text,
        url -> Text,
        price -> Nullable<Text>,
        availability -> Text,
        rating -> Nullable<Text>,
        trama -> Nullable<Text>,
        cover -> Nullable<Text>,
        cover_bin -> Nullable<Binary>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(manga, urls);
