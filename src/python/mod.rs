#![cfg(feature = "python-bindings")]

use pyo3::types::PyModuleMethods;
use pyo3::{Bound, PyResult, Python, pymodule, types::PyModule};

pub mod py_listing_filter;

pub mod py_listings_table;

#[pymodule]
fn listings_processor(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<py_listings_table::PyListingsTable>()?;
    m.add_class::<py_listings_table::PyTableCache>()?;
    m.add_class::<py_listing_filter::PyListingFilter>()?;
    Ok(())
}
