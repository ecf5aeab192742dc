//! CSV fixtures shared by the integration tests

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use chrono::{Duration, NaiveDate};

pub const LINE_ITEMS_HEADER: &str =
    ",id_venta,id_producto,nombre_producto,cantidad,precio_unitario,importe";

pub fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

/// Write the four source files with the given CSV bodies (header included)
pub fn write_sources(dir: &Path, line_items: &str, sales: &str, customers: &str, products: &str) {
    fs::write(dir.join("detalle_ventas.csv"), line_items).unwrap();
    fs::write(dir.join("ventas.csv"), sales).unwrap();
    fs::write(dir.join("clientes.csv"), customers).unwrap();
    fs::write(dir.join("productos.csv"), products).unwrap();
}

/// Two customers: #1 buys 10, 20 and 30 in three sales, #2 buys 50 once.
/// Line item of sale 999 has no sale header.
pub fn write_two_customer_scenario(dir: &Path) {
    let line_items = format!(
        "{LINE_ITEMS_HEADER}\n\
         0,1,100,Yerba,1,10.0,10.0\n\
         1,2,100,Yerba,2,10.0,20.0\n\
         2,3,101,Mate,1,30.0,30.0\n\
         3,4,101,Mate,1,50.0,50.0\n\
         4,999,100,Yerba,3,10.0,30.0\n"
    );
    let sales = "id_venta,fecha,id_cliente,nombre_cliente,email\n\
                 1,2024-01-10,1,Ana,ana@venta.com\n\
                 2,2024-02-10,1,Ana,ana@venta.com\n\
                 3,2024-03-10,1,Ana,ana@venta.com\n\
                 4,2024-04-01,2,Luis,luis@venta.com\n";
    let customers = "id_cliente,nombre_cliente,email,ciudad,fecha_alta, notas \n\
                     1,Ana,ana@cliente.com,Rosario,2023-01-01,\n\
                     2,Luis,luis@cliente.com,Salta,2023-05-01,\n";
    let products = "id_producto,nombre_producto,precio_unitario\n\
                    100,Yerba,11.0\n\
                    101,Mate,31.0\n";
    write_sources(dir, &line_items, sales, customers, products);
}

/// Thirty customers across three cities with varied purchase histories,
/// plus duplicated rows that cleaning must collapse
pub fn write_regression_dataset(dir: &Path) {
    write_dataset(dir, |customer, purchase| 1 + (customer * 7 + purchase) % 5);
}

/// Same customers, but every line item is a single unit, so
/// `total_productos` equals `total_compras` for everyone
pub fn write_single_unit_dataset(dir: &Path) {
    write_dataset(dir, |_, _| 1);
}

fn write_dataset(dir: &Path, quantity_of: impl Fn(usize, usize) -> usize) {
    let cities = ["Cordoba", "Mendoza", "Rosario"];
    let prices = [10.0, 15.0, 20.0];
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    let mut line_items = format!("{LINE_ITEMS_HEADER}\n");
    let mut sales = String::from("id_venta,fecha,id_cliente\n");
    let mut customers = String::from("id_cliente,nombre_cliente,ciudad,fecha_alta\n");
    let mut products = String::from("id_producto,nombre_producto,precio_unitario\n");
    let mut row = 0;

    for (i, price) in prices.iter().enumerate() {
        products.push_str(&format!("{},Producto {},{:.1}\n", i + 1, i + 1, price));
    }

    for customer in 1..=30usize {
        customers.push_str(&format!(
            "{customer},Cliente {customer},{},2023-01-01\n",
            cities[customer % 3]
        ));

        for purchase in 0..(1 + customer % 4) {
            let sale_id = customer * 10 + purchase;
            let date = start + Duration::days(((customer * 11 + purchase * 5) % 90) as i64);
            sales.push_str(&format!("{sale_id},{date},{customer}\n"));

            let product = (customer + purchase) % 3;
            let quantity = quantity_of(customer, purchase);
            let amount = quantity as f64 * prices[product];
            line_items.push_str(&format!(
                "{row},{sale_id},{},Producto {},{quantity},{:.1},{:.1}\n",
                product + 1,
                product + 1,
                prices[product],
                amount
            ));
            row += 1;
        }
    }

    // a re-sent header row and line item, both superseded by the last copy
    sales.push_str("11,2024-01-12,1\n");
    let quantity = quantity_of(1, 1);
    line_items.push_str(&format!(
        "{row},11,3,Producto 3,{quantity},20.0,{:.1}\n",
        quantity as f64 * 20.0
    ));

    write_sources(dir, &line_items, &sales, &customers, &products);
}
