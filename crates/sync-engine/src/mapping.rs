use schema::{
    validate_row, Game, GameOpening, GameToUser, Record, RowValidator, TimeControl, User,
};

/// Static binding of one relational table to one destination collection.
#[derive(Clone, Copy)]
pub struct TableMapping {
    /// Logical name used in reports and metrics.
    pub name: &'static str,
    pub table: &'static str,
    pub collection: &'static str,
    pub key_fields: &'static [&'static str],
    pub validate: RowValidator,
}

impl TableMapping {
    pub const fn of<R: Record>(
        name: &'static str,
        table: &'static str,
        collection: &'static str,
    ) -> Self {
        Self {
            name,
            table,
            collection,
            key_fields: R::KEY_FIELDS,
            validate: validate_row::<R>,
        }
    }
}

impl std::fmt::Debug for TableMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableMapping")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("collection", &self.collection)
            .field("key_fields", &self.key_fields)
            .finish_non_exhaustive()
    }
}

/// Every replicated table. New tables are added here and nowhere else.
pub static MAPPINGS: &[TableMapping] = &[
    TableMapping::of::<User>("user", "user", "user"),
    TableMapping::of::<GameOpening>("game_opening", "game_opening", "game_opening"),
    TableMapping::of::<TimeControl>("time_control", "time_control", "time_control"),
    TableMapping::of::<Game>("game", "game", "game"),
    TableMapping::of::<GameToUser>("game_to_user", "game_to_user", "game_to_user"),
];
