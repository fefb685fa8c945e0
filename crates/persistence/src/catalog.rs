//! Table catalogue for the storefront schema.
//!
//! Every resource type the server exposes maps to one [`TableDef`]. A table
//! definition lists its columns in declaration order (the order attributes
//! are returned in), whether the table carries timestamps or soft deletes,
//! the relations other tables can be reached through, and which relations a
//! soft delete cascades into.
//!
//! The catalogue drives both DDL generation and query building, so column and
//! relation names are only ever interpolated into SQL after being looked up
//! here.

use crate::error::{StorageResult, ValidationError};

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Boolean,
    /// RFC 3339 UTC string.
    Timestamp,
}

impl ColumnKind {
    fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Integer | ColumnKind::Boolean => "INTEGER",
            ColumnKind::Text | ColumnKind::Timestamp => "TEXT",
        }
    }
}

/// A persisted column other than the primary key.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

/// How a relation is stored.
#[derive(Debug, Clone)]
pub enum RelationKind {
    /// Foreign key column on the owning table.
    BelongsTo { foreign_key: &'static str },
    /// Join table holding `(owner_key, related_key)` pairs.
    BelongsToMany {
        pivot: &'static str,
        owner_key: &'static str,
        related_key: &'static str,
        timestamps: bool,
    },
}

/// A named relation from one table to another.
#[derive(Debug, Clone)]
pub struct RelationDef {
    pub name: &'static str,
    /// Resource type of the related table.
    pub related: &'static str,
    pub kind: RelationKind,
}

impl RelationDef {
    pub fn is_to_many(&self) -> bool {
        matches!(self.kind, RelationKind::BelongsToMany { .. })
    }
}

/// Definition of a single resource table.
#[derive(Debug, Clone)]
pub struct TableDef {
    pub resource_type: &'static str,
    pub table: &'static str,
    pub columns: Vec<ColumnDef>,
    pub timestamps: bool,
    pub soft_deletes: bool,
    pub relations: Vec<RelationDef>,
    /// Relations whose records are soft-deleted (and restored) together with the owner.
    pub cascades: Vec<&'static str>,
}

impl TableDef {
    fn new(resource_type: &'static str, table: &'static str) -> Self {
        Self {
            resource_type,
            table,
            columns: Vec::new(),
            timestamps: false,
            soft_deletes: false,
            relations: Vec::new(),
            cascades: Vec::new(),
        }
    }

    fn column(mut self, name: &'static str, kind: ColumnKind) -> Self {
        self.columns.push(ColumnDef {
            name,
            kind,
            nullable: false,
        });
        self
    }

    fn nullable(mut self, name: &'static str, kind: ColumnKind) -> Self {
        self.columns.push(ColumnDef {
            name,
            kind,
            nullable: true,
        });
        self
    }

    fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self.nullable("created_at", ColumnKind::Timestamp)
            .nullable("updated_at", ColumnKind::Timestamp)
    }

    fn with_soft_deletes(mut self) -> Self {
        self.soft_deletes = true;
        self.nullable("deleted_at", ColumnKind::Timestamp)
    }

    fn belongs_to(
        mut self,
        name: &'static str,
        related: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        self.relations.push(RelationDef {
            name,
            related,
            kind: RelationKind::BelongsTo { foreign_key },
        });
        self
    }

    fn belongs_to_many(
        mut self,
        name: &'static str,
        related: &'static str,
        pivot: &'static str,
        owner_key: &'static str,
        related_key: &'static str,
        timestamps: bool,
    ) -> Self {
        self.relations.push(RelationDef {
            name,
            related,
            kind: RelationKind::BelongsToMany {
                pivot,
                owner_key,
                related_key,
                timestamps,
            },
        });
        self
    }

    fn cascade(mut self, relation: &'static str) -> Self {
        self.cascades.push(relation);
        self
    }

    /// Looks up a column by name. `id` is not a column.
    pub fn column_def(&self, name: &str) -> StorageResult<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                ValidationError::UnknownColumn {
                    resource_type: self.resource_type.to_string(),
                    column: name.to_string(),
                }
                .into()
            })
    }

    /// Returns true if `name` is the primary key or a declared column.
    pub fn has_column(&self, name: &str) -> bool {
        name == "id" || self.columns.iter().any(|c| c.name == name)
    }

    /// Looks up a relation by name.
    pub fn relation(&self, name: &str) -> StorageResult<&RelationDef> {
        self.relations
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| {
                ValidationError::UnknownRelation {
                    resource_type: self.resource_type.to_string(),
                    relation: name.to_string(),
                }
                .into()
            })
    }

    /// `CREATE TABLE` statement for this table.
    pub fn create_table_sql(&self) -> String {
        let mut parts = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
        for column in &self.columns {
            let null = if column.nullable { "" } else { " NOT NULL" };
            parts.push(format!(
                "{} {}{}",
                column.name,
                column.kind.sql_type(),
                null
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.table,
            parts.join(",\n    ")
        )
    }
}

/// The full set of tables.
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: Vec<TableDef>,
}

impl Catalog {
    /// Builds the storefront catalogue.
    pub fn storefront() -> Self {
        use ColumnKind::*;

        let tables = vec![
            TableDef::new("users", "users")
                .column("name", Text)
                .column("email", Text)
                .column("password", Text)
                .with_timestamps()
                .with_soft_deletes(),
            TableDef::new("sellers", "sellers")
                .column("user_id", Integer)
                .with_timestamps()
                .with_soft_deletes()
                .belongs_to("users", "users", "user_id")
                .belongs_to_many("shops", "shops", "seller_shop", "seller_id", "shop_id", true)
                .cascade("shops"),
            TableDef::new("shops", "shops")
                .column("name", Text)
                .with_timestamps()
                .with_soft_deletes()
                .belongs_to_many("sellers", "sellers", "seller_shop", "shop_id", "seller_id", true)
                .belongs_to_many(
                    "shop-types",
                    "shop-types",
                    "shop_shop_type",
                    "shop_id",
                    "shop_type_id",
                    false,
                )
                .belongs_to_many(
                    "employees",
                    "employees",
                    "employee_shop",
                    "shop_id",
                    "employee_id",
                    true,
                )
                .belongs_to_many(
                    "products",
                    "products",
                    "product_shop",
                    "shop_id",
                    "product_id",
                    true,
                ),
            TableDef::new("shop-types", "shop_types")
                .column("name", Text)
                .nullable("description", Text)
                .nullable("image", Text)
                .with_timestamps()
                .belongs_to_many(
                    "shops",
                    "shops",
                    "shop_shop_type",
                    "shop_type_id",
                    "shop_id",
                    false,
                ),
            TableDef::new("brands", "brands").column("name", Text),
            TableDef::new("product-units", "product_units")
                .column("name", Text)
                .nullable("multiplier", Integer),
            TableDef::new("products", "products")
                .column("name", Text)
                .nullable("model_number", Text)
                .nullable("product_unit_id", Integer)
                .nullable("brand_id", Integer)
                .with_timestamps()
                .belongs_to("brands", "brands", "brand_id")
                .belongs_to("product-units", "product-units", "product_unit_id")
                .belongs_to_many(
                    "shops",
                    "shops",
                    "product_shop",
                    "product_id",
                    "shop_id",
                    true,
                ),
            TableDef::new("employees", "employees")
                .column("user_id", Integer)
                .nullable("is_active", Boolean)
                .nullable("manager_id", Integer)
                .with_timestamps()
                .belongs_to("users", "users", "user_id")
                .belongs_to_many(
                    "shops",
                    "shops",
                    "employee_shop",
                    "employee_id",
                    "shop_id",
                    true,
                ),
            TableDef::new("transactions", "transactions")
                .column("shop_id", Integer)
                .nullable("employee_id", Integer)
                .nullable("user_id", Integer)
                .with_timestamps()
                .belongs_to("shops", "shops", "shop_id")
                .belongs_to("employees", "employees", "employee_id")
                .belongs_to("users", "users", "user_id"),
        ];

        Self { tables }
    }

    /// Looks up the table for a resource type.
    pub fn table(&self, resource_type: &str) -> StorageResult<&TableDef> {
        self.tables
            .iter()
            .find(|t| t.resource_type == resource_type)
            .ok_or_else(|| {
                ValidationError::UnsupportedResourceType {
                    resource_type: resource_type.to_string(),
                }
                .into()
            })
    }

    /// All tables in declaration order.
    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// `CREATE TABLE` statements for every join table, deduplicated.
    pub fn pivot_tables_sql(&self) -> Vec<String> {
        let mut seen: Vec<&str> = Vec::new();
        let mut statements = Vec::new();

        for table in &self.tables {
            for relation in &table.relations {
                let RelationKind::BelongsToMany {
                    pivot,
                    owner_key,
                    related_key,
                    timestamps,
                } = &relation.kind
                else {
                    continue;
                };
                if seen.contains(pivot) {
                    continue;
                }
                seen.push(*pivot);

                let related_table = self
                    .table(relation.related)
                    .map(|t| t.table)
                    .unwrap_or(relation.related);
                let stamps = if *timestamps {
                    ",\n    created_at TEXT,\n    updated_at TEXT"
                } else {
                    ""
                };
                statements.push(format!(
                    "CREATE TABLE IF NOT EXISTS {pivot} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    {owner_key} INTEGER NOT NULL REFERENCES {owner} (id) ON DELETE CASCADE,
    {related_key} INTEGER NOT NULL REFERENCES {related_table} (id) ON DELETE CASCADE{stamps},
    UNIQUE ({owner_key}, {related_key})
)",
                    owner = table.table,
                ));
            }
        }

        statements
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::storefront()
    }
}
