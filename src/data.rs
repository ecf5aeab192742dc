//! Loading of the four source tables from CSV using Polars

use std::fmt;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::clean::{coerce_dates, dedup_last_by, normalize_columns};
use crate::schema::{CUSTOMER_ID, PRODUCT_ID, SALE_DATE, SALE_ID, SIGNUP_DATE};

/// Rows scanned to infer column types
const INFER_SCHEMA_ROWS: usize = 1000;

/// The four tables the pipeline reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    LineItems,
    Sales,
    Customers,
    Products,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::LineItems,
        TableKind::Customers,
        TableKind::Products,
        TableKind::Sales,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            TableKind::LineItems => "detalle_ventas.csv",
            TableKind::Sales => "ventas.csv",
            TableKind::Customers => "clientes.csv",
            TableKind::Products => "productos.csv",
        }
    }

    /// Key whose values must be unique once the table is cleaned
    pub fn dedup_key(self) -> &'static [&'static str] {
        match self {
            TableKind::LineItems => &[SALE_ID, PRODUCT_ID],
            TableKind::Sales => &[SALE_ID],
            TableKind::Customers => &[CUSTOMER_ID],
            TableKind::Products => &[PRODUCT_ID],
        }
    }

    /// Date columns parsed during cleaning
    pub fn date_columns(self) -> &'static [&'static str] {
        match self {
            TableKind::Sales => &[SALE_DATE],
            TableKind::Customers => &[SIGNUP_DATE],
            TableKind::LineItems | TableKind::Products => &[],
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableKind::LineItems => "line_items",
            TableKind::Sales => "sales",
            TableKind::Customers => "customers",
            TableKind::Products => "products",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("missing input file for {table}: {}", path.display())]
    MissingInput { table: TableKind, path: PathBuf },
    #[error("failed to read {table} from {}: {source}", path.display())]
    Read {
        table: TableKind,
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
}

/// The raw or cleaned source tables
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub line_items: DataFrame,
    pub sales: DataFrame,
    pub customers: DataFrame,
    pub products: DataFrame,
}

impl SourceTables {
    pub fn get(&self, kind: TableKind) -> &DataFrame {
        match kind {
            TableKind::LineItems => &self.line_items,
            TableKind::Sales => &self.sales,
            TableKind::Customers => &self.customers,
            TableKind::Products => &self.products,
        }
    }

    /// Normalize, deduplicate and date-parse every table
    pub fn clean(self) -> PolarsResult<SourceTables> {
        Ok(SourceTables {
            line_items: clean_table(TableKind::LineItems, self.line_items)?,
            sales: clean_table(TableKind::Sales, self.sales)?,
            customers: clean_table(TableKind::Customers, self.customers)?,
            products: clean_table(TableKind::Products, self.products)?,
        })
    }
}

fn clean_table(kind: TableKind, df: DataFrame) -> PolarsResult<DataFrame> {
    let rows_in = df.height();
    let df = normalize_columns(df)?;
    let df = dedup_last_by(df, kind.dedup_key())?;
    let df = coerce_dates(df, kind.date_columns())?;

    info!(
        component = "clean",
        event = "table.cleaned",
        table = %kind,
        rows_in,
        rows_out = df.height(),
        columns = df.width()
    );
    Ok(df)
}

/// Path of a table's CSV file inside `input_dir`
pub fn source_path(input_dir: &Path, kind: TableKind) -> PathBuf {
    input_dir.join(kind.file_name())
}

/// Load all four tables from `input_dir`.
///
/// Every file is checked before any is read, so a missing file aborts the
/// load without reading the others.
///
/// # Arguments
/// * `input_dir` - Directory holding the four CSV files
///
/// # Returns
/// The raw tables, or `LoadError::MissingInput` naming the first absent file
pub fn load_source_tables(input_dir: &Path) -> Result<SourceTables, LoadError> {
    for kind in TableKind::ALL {
        let path = source_path(input_dir, kind);
        if !path.is_file() {
            return Err(LoadError::MissingInput { table: kind, path });
        }
    }

    Ok(SourceTables {
        line_items: read_table(input_dir, TableKind::LineItems)?,
        sales: read_table(input_dir, TableKind::Sales)?,
        customers: read_table(input_dir, TableKind::Customers)?,
        products: read_table(input_dir, TableKind::Products)?,
    })
}

/// Read one table's CSV file; an unreadable or absent file is a `Read` error
pub fn read_table(input_dir: &Path, kind: TableKind) -> Result<DataFrame, LoadError> {
    let path = source_path(input_dir, kind);

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .try_into_reader_with_file_path(Some(path.clone()))
        .and_then(|reader| reader.finish())
        .map_err(|source| LoadError::Read {
            table: kind,
            path: path.clone(),
            source,
        })?;

    info!(
        component = "loader",
        event = "table.loaded",
        table = %kind,
        path = %path.display(),
        rows = df.height(),
        columns = df.width()
    );
    Ok(df)
}
