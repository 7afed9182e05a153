//! Table catalog backed by the schemas declared in the config file

use framemacros_ir::{DataType, SchemaError, SchemaProvider, StaticSchemaProvider, TableSchema};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ColumnListing {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableListing {
    pub name: String,
    pub columns: Vec<ColumnListing>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    provider: StaticSchemaProvider,
}

impl Catalog {
    pub fn new(tables: impl IntoIterator<Item = TableSchema>) -> Self {
        let mut provider = StaticSchemaProvider::new();
        for table in tables {
            provider.add_table(table);
        }
        Self { provider }
    }

    /// Tables sorted by name.
    pub fn listing(&self) -> Vec<TableListing> {
        self.provider
            .table_names()
            .into_iter()
            .filter_map(|name| self.provider.get_table_schema(name).ok())
            .map(|schema| TableListing {
                name: schema.name,
                columns: schema
                    .columns
                    .into_iter()
                    .map(|column| ColumnListing {
                        name: column.name,
                        data_type: column.data_type,
                        nullable: column.nullable,
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.provider.table_names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SchemaProvider for Catalog {
    fn get_table_schema(&self, table_name: &str) -> Result<TableSchema, SchemaError> {
        self.provider.get_table_schema(table_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framemacros_ir::ColumnInfo;

    #[test]
    fn test_listing_sorted_with_types() {
        let catalog = Catalog::new([
            TableSchema::from_names("zoo", ["animal"]),
            TableSchema::new(
                "people",
                vec![
                    ColumnInfo::new("name", DataType::String),
                    ColumnInfo::new("age", DataType::Int).nullable(),
                ],
            ),
        ]);

        let listing = catalog.listing();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].name, "people");
        assert_eq!(listing[0].columns[1].data_type, DataType::Int);
        assert!(listing[0].columns[1].nullable);
        assert_eq!(listing[1].name, "zoo");
    }

    #[test]
    fn test_unknown_table() {
        let catalog = Catalog::default();
        assert!(catalog.is_empty());
        assert!(matches!(
            catalog.get_table_schema("people"),
            Err(SchemaError::TableNotFound(_))
        ));
    }
}
