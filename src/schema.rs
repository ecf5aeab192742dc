//! Column names shared by the source tables and the derived feature table

pub const SALE_ID: &str = "id_venta";
pub const PRODUCT_ID: &str = "id_producto";
pub const CUSTOMER_ID: &str = "id_cliente";

pub const AMOUNT: &str = "importe";
pub const QUANTITY: &str = "cantidad";
pub const UNIT_PRICE: &str = "precio_unitario";
pub const SALE_DATE: &str = "fecha";

pub const PRODUCT_NAME: &str = "nombre_producto";
pub const CUSTOMER_NAME: &str = "nombre_cliente";
pub const EMAIL: &str = "email";
pub const CITY: &str = "ciudad";
pub const SIGNUP_DATE: &str = "fecha_alta";

pub const TOTAL_SPEND: &str = "gasto_total";
pub const PURCHASE_COUNT: &str = "total_compras";
pub const TOTAL_QUANTITY: &str = "total_productos";
pub const FIRST_PURCHASE: &str = "fecha_primera_compra";
pub const TENURE_DAYS: &str = "antiguedad_dias";

/// Suffix tagging the left (line-item) side of a join collision
pub const LEFT_SUFFIX: &str = "_x";
/// Suffix tagging the right (lookup table) side of a join collision
pub const RIGHT_SUFFIX: &str = "_y";

/// Collisions known to occur between the source tables
pub const DOCUMENTED_COLLISIONS: [&str; 4] = [UNIT_PRICE, PRODUCT_NAME, CUSTOMER_NAME, EMAIL];

/// Columns a joined row must carry to reach aggregation
pub const REQUIRED_FOR_AGGREGATION: [&str; 4] = [CUSTOMER_ID, AMOUNT, QUANTITY, SALE_DATE];

/// Columns parsed as floats once the tables are joined
pub const NUMERIC_COLUMNS: [&str; 3] = [UNIT_PRICE, AMOUNT, QUANTITY];
