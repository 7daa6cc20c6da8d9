use arrow2::ffi::export_field_to_c;
use arrow2::ffi::{ArrowArray, ArrowSchema, export_array_to_c};
use pyo3::exceptions;
use pyo3::prelude::*;
use pyo3::types::PyList;
use std::path::Path;
use std::sync::Arc;

use crate::processor::{
    GroupKey, NegotiationType, ProcessorError,
    aggregate::{GroupedSeries, group_mean},
    correlate::correlate_with,
    derive::with_cost_per_area,
    filter::{ListingFilter, filter},
    listings_table::ListingsTable,
    rank::{rank_asc, rank_desc},
    report::DistrictReport,
    table_cache::TableCache,
};
use crate::python::py_listing_filter::PyListingFilter;

/// Convert Rust errors to Python exceptions
impl From<ProcessorError> for PyErr {
    fn from(err: ProcessorError) -> PyErr {
        match err {
            ProcessorError::Io(e) => exceptions::PyIOError::new_err(e.to_string()),
            ProcessorError::Validation(e) => exceptions::PyValueError::new_err(e.to_string()),
            ProcessorError::MissingColumn(c) => exceptions::PyKeyError::new_err(c),
            ProcessorError::Parse(msg) => exceptions::PyValueError::new_err(msg),
            other => exceptions::PyRuntimeError::new_err(other.to_string()),
        }
    }
}

fn key_to_py(py: Python<'_>, key: GroupKey) -> PyResult<Py<PyAny>> {
    Ok(match key {
        GroupKey::Int(v) => v.into_pyobject(py)?.into_any().unbind(),
        GroupKey::Str(v) => v.into_pyobject(py)?.into_any().unbind(),
    })
}

fn entries_to_py(py: Python<'_>, entries: Vec<(GroupKey, f64)>) -> PyResult<Vec<(Py<PyAny>, f64)>> {
    entries
        .into_iter()
        .map(|(k, v)| Ok((key_to_py(py, k)?, v)))
        .collect()
}

/// Immutable listings table shared with Python
#[pyclass(frozen)]
pub struct PyListingsTable {
    inner: Arc<ListingsTable>,
}

impl PyListingsTable {
    fn wrap(table: ListingsTable) -> Self {
        PyListingsTable {
            inner: Arc::new(table),
        }
    }

    fn series(&self, group_key: &str, value_key: &str) -> Result<GroupedSeries, ProcessorError> {
        group_mean(&self.inner, group_key, value_key)
    }
}

#[pymethods]
impl PyListingsTable {
    #[staticmethod]
    pub fn load(path: String) -> PyResult<Self> {
        let (table, _summary) = ListingsTable::load_csv(Path::new(&path))?;
        Ok(Self::wrap(table))
    }

    pub fn row_count(&self) -> usize {
        self.inner.row_count()
    }

    pub fn headers(&self) -> Vec<String> {
        self.inner.headers().to_vec()
    }

    /// Returns the matching rows and the number of active predicates
    pub fn filter(&self, listing_filter: &PyListingFilter) -> PyResult<(Self, usize)> {
        let view = filter(&self.inner, &listing_filter.inner)?;
        let active = view.active_predicates();
        Ok((Self::wrap(view.into_table()), active))
    }

    /// Raises `ValueError` when a size is null or non-positive
    pub fn with_cost_per_area(&self) -> PyResult<Self> {
        let derived = with_cost_per_area(&self.inner).map_err(ProcessorError::from)?;
        Ok(Self::wrap(derived))
    }

    pub fn group_mean(
        &self,
        py: Python<'_>,
        group_key: &str,
        value_key: &str,
    ) -> PyResult<Vec<(Py<PyAny>, f64)>> {
        let series = self.series(group_key, value_key)?;
        entries_to_py(py, series.into_entries())
    }

    pub fn rank_desc(
        &self,
        py: Python<'_>,
        group_key: &str,
        value_key: &str,
        n: usize,
    ) -> PyResult<Vec<(Py<PyAny>, f64)>> {
        let series = self.series(group_key, value_key)?;
        entries_to_py(py, rank_desc(&series, n))
    }

    pub fn rank_asc(
        &self,
        py: Python<'_>,
        group_key: &str,
        value_key: &str,
        n: usize,
    ) -> PyResult<Vec<(Py<PyAny>, f64)>> {
        let series = self.series(group_key, value_key)?;
        entries_to_py(py, rank_asc(&series, n))
    }

    /// `(column, coefficient)` pairs; undefined coefficients are `None`
    pub fn correlate_with(&self, target: &str) -> PyResult<Vec<(String, Option<f64>)>> {
        Ok(correlate_with(&self.inner, target)?
            .into_iter()
            .map(|e| (e.column, e.correlation.value()))
            .collect())
    }

    /// District report serialized as JSON
    #[pyo3(signature = (negotiation_type, district, extra=None))]
    pub fn district_report(
        &self,
        negotiation_type: &str,
        district: &str,
        extra: Option<PyRef<'_, PyListingFilter>>,
    ) -> PyResult<String> {
        let negotiation_type: NegotiationType = negotiation_type.parse()?;
        let extra = extra.map(|f| f.inner.clone()).unwrap_or_else(ListingFilter::new);
        let report = DistrictReport::build(&self.inner, negotiation_type, district, &extra)?;
        serde_json::to_string(&report)
            .map_err(|e| exceptions::PyRuntimeError::new_err(e.to_string()))
    }

    /// Expose Arrow data as PyArrow objects
    pub fn to_arrow(&self, py: Python<'_>) -> PyResult<Py<PyAny>> {
        let (schema, chunk) = self.inner.to_arrow();

        // metadata pointers only; buffers stay owned by the exported arrays
        let c_schema_fields: Vec<ArrowSchema> =
            schema.fields.iter().map(export_field_to_c).collect();

        let c_arrays: Vec<ArrowArray> = chunk
            .arrays()
            .iter()
            .map(|array| export_array_to_c(array.to_boxed()))
            .collect();

        let pyarrow = py.import("pyarrow")?;

        let fields_obj = PyList::empty(py);
        for c_schema_field in &c_schema_fields {
            let field_ptr = c_schema_field as *const ArrowSchema as usize;
            let field_obj = pyarrow
                .getattr("Field")?
                .getattr("_import_from_c")?
                .call1((field_ptr,))?;
            fields_obj.append(field_obj)?;
        }

        let schema_obj = pyarrow.getattr("schema")?.call1((fields_obj,))?;

        let arrays_obj = PyList::empty(py);
        for (c_array, c_schema_field) in c_arrays.iter().zip(c_schema_fields.iter()) {
            let array_ptr = c_array as *const ArrowArray as usize;
            let schema_ptr = c_schema_field as *const ArrowSchema as usize;
            let arr_obj = pyarrow
                .getattr("Array")?
                .getattr("_import_from_c")?
                .call1((array_ptr, schema_ptr))?;
            arrays_obj.append(arr_obj)?;
        }

        let table = pyarrow.getattr("Table")?.call1((arrays_obj, schema_obj))?;

        Ok(table.into())
    }
}

/// Python bindings for TableCache
#[pyclass(frozen)]
pub struct PyTableCache {
    inner: TableCache,
}

#[pymethods]
impl PyTableCache {
    #[new]
    #[pyo3(signature = (capacity=8))]
    fn new(capacity: usize) -> Self {
        Self {
            inner: TableCache::with_capacity(capacity, Default::default()),
        }
    }

    pub fn get_or_load(&self, path: String) -> PyResult<PyListingsTable> {
        let table = self.inner.get_or_load(Path::new(&path))?;
        Ok(PyListingsTable { inner: table })
    }

    pub fn invalidate(&self, path: String) {
        self.inner.invalidate(Path::new(&path));
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }
}
