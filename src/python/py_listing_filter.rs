use pyo3::prelude::*;

use crate::processor::{NegotiationType, filter::ListingFilter};

/// Listing filter; every argument defaults to "All"
#[pyclass]
#[derive(Clone)]
pub struct PyListingFilter {
    pub inner: ListingFilter,
}

#[pymethods]
impl PyListingFilter {
    #[new]
    #[pyo3(signature = (district=None, negotiation_type=None, rooms=None, suites=None, parking_spaces=None, has_pool=None))]
    pub fn new(
        district: Option<String>,
        negotiation_type: Option<&str>,
        rooms: Option<i64>,
        suites: Option<i64>,
        parking_spaces: Option<i64>,
        has_pool: Option<bool>,
    ) -> PyResult<Self> {
        let negotiation_type = negotiation_type
            .map(str::parse::<NegotiationType>)
            .transpose()?;
        Ok(PyListingFilter {
            inner: ListingFilter {
                district,
                negotiation_type,
                rooms,
                suites,
                parking_spaces,
                has_pool,
            },
        })
    }

    pub fn active_count(&self) -> usize {
        self.inner.active_count()
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.inner)
    }
}
