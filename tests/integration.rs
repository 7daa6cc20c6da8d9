use std::io::Write;
use std::sync::Arc;

use listings_processor::processor::{
    GroupKey, NegotiationType, ProcessorError, RowRef, ValidationError,
    aggregate::group_mean,
    column::Column,
    correlate::{Correlation, correlate_with},
    derive::{round_to_cents, with_cost_per_area},
    filter::{ListingFilter, filter},
    listings_table::ListingsTable,
    rank::{rank_desc, top},
    report::{DistrictReport, MarkerKind, map_points},
    schema::{COST_PER_AREA, DISTRICT, NEGOTIATION_TYPE, POOL, PRICE, ROOMS, SIZE},
    table_cache::TableCache,
};
use tempfile::NamedTempFile;

const LISTINGS_CSV: &str = "\
Preço,Condomínio,Tamanho,Quartos,Suítes,Vagas,Piscina,Distrito,Tipo de Negociação,Latitude,Longitude
930000,1000,47,2,1,1,0,Moema,sale,-23.6,-46.66
1200000,1500,80,3,2,2,1,Moema,sale,-23.61,-46.67
3500,600,45,1,0,1,0,Moema,rent,-23.59,-46.65
450000,350,60,2,0,1,0,Sé,sale,-23.55,-46.63
520000,,65,2,1,0,0,Sé,sale,,
2800,400,40,1,0,0,0,Pinheiros,rent,-23.56,-46.69
";

fn load(csv: &str) -> ListingsTable {
    let mut tmp = NamedTempFile::new().unwrap();
    write!(tmp, "{}", csv).unwrap();
    let (table, summary) = ListingsTable::load_csv(tmp.path()).unwrap();
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    table
}

fn rows_of(table: &ListingsTable) -> Vec<Vec<String>> {
    (0..table.row_count())
        .map(|i| {
            table
                .iter_columns()
                .map(|(_, c)| format!("{:?}", c.value(i)))
                .collect()
        })
        .collect()
}

#[test]
fn test_filter_is_subset_and_idempotent() {
    let table = load(LISTINGS_CSV);
    let f = ListingFilter::new()
        .district("Moema")
        .negotiation_type(NegotiationType::Sale);

    let once = filter(&table, &f).unwrap();
    let twice = filter(once.table(), &f).unwrap();
    assert_eq!(once.table(), twice.table());

    let all_rows = rows_of(&table);
    let filtered = rows_of(once.table());
    assert_eq!(filtered.len(), 2);
    for row in &filtered {
        assert!(all_rows.contains(row));
    }
}

#[test]
fn test_cost_per_area_matches_rounded_quotient() {
    let table = load(LISTINGS_CSV);
    let derived = with_cost_per_area(&table).unwrap();
    let price = derived.get_col(PRICE).unwrap();
    let size = derived.get_col(SIZE).unwrap();
    let cost = derived.get_col(COST_PER_AREA).unwrap();

    for i in 0..derived.row_count() {
        let expected = round_to_cents(price.get_f64(i).unwrap() / size.get_f64(i).unwrap());
        assert_eq!(cost.get_f64(i), Some(expected));
    }
    assert_eq!(cost.get_f64(0), Some(19787.23));
}

#[test]
fn test_cost_per_area_null_size_cites_row() {
    let table = load("Distrito,Preço,Tamanho\nA,100,10\nA,200,20\nB,300,\n");
    let err = with_cost_per_area(&table).unwrap_err();
    assert_eq!(
        err,
        ValidationError::NullValues {
            column: SIZE.to_string(),
            count: 1,
            first: RowRef {
                row: 2,
                district: Some("B".to_string()),
            },
        }
    );
    assert!(err.to_string().contains("district B"));
}

#[test]
fn test_cost_per_area_rejects_non_positive_size() {
    let table = load("Distrito,Preço,Tamanho\nA,100,10\nB,300,0\n");
    assert!(matches!(
        with_cost_per_area(&table),
        Err(ValidationError::NonPositiveValues { count: 1, .. })
    ));
}

#[test]
fn test_group_mean_exact() {
    let table = load("Distrito,Preço\nA,100\nA,300\n");
    let series = group_mean(&table, DISTRICT, PRICE).unwrap();
    assert_eq!(series.into_entries(), vec![(GroupKey::from("A"), 200.0)]);
}

#[test]
fn test_group_mean_only_present_keys() {
    let table = load(LISTINGS_CSV);
    let sales = filter(
        &table,
        &ListingFilter::new().negotiation_type(NegotiationType::Sale),
    )
    .unwrap();
    let series = group_mean(sales.table(), DISTRICT, PRICE).unwrap();
    let keys: Vec<_> = series.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, vec!["Moema", "Sé"]);
    assert_eq!(series.get(&GroupKey::from("Sé")), Some(485000.0));
}

#[test]
fn test_rank_properties() {
    let table = load(LISTINGS_CSV);
    let series = group_mean(&table, ROOMS, PRICE).unwrap();

    for n in 0..5 {
        let ranked = rank_desc(&series, n);
        assert!(ranked.len() <= n);
        assert!(ranked.windows(2).all(|w| {
            w[0].1 > w[1].1 || (w[0].1 == w[1].1 && w[0].0 < w[1].0)
        }));
    }

    let all = top(&series, series.len());
    assert_eq!(all.len(), series.len());
    assert_eq!(all[0].0, GroupKey::Int(3));
}

#[test]
fn test_constant_column_correlation_is_undefined_and_last() {
    let table = load(LISTINGS_CSV);
    let sales = filter(
        &table,
        &ListingFilter::new().negotiation_type(NegotiationType::Sale),
    )
    .unwrap();
    let constant = sales
        .table()
        .with_column("Elevador", Column::from_i64(vec![1; sales.row_count()]))
        .unwrap();

    let entries = correlate_with(&constant, PRICE).unwrap();
    let last = entries.last().unwrap();
    assert!(entries.iter().all(|e| e.column != PRICE));
    assert!(entries.iter().any(|e| e.column == "Elevador"));

    let first_undefined = entries
        .iter()
        .position(|e| e.correlation.is_undefined())
        .unwrap();
    assert!(
        entries[first_undefined..]
            .iter()
            .all(|e| e.correlation == Correlation::Undefined)
    );
    assert!(last.correlation.is_undefined());
    assert!(
        entries[..first_undefined]
            .windows(2)
            .all(|w| w[0].correlation.value() >= w[1].correlation.value())
    );
}

#[test]
fn test_district_report_and_map() {
    let table = load(LISTINGS_CSV);
    let extra = ListingFilter::new().has_pool(true);
    let report = DistrictReport::build(&table, NegotiationType::Sale, "Moema", &extra).unwrap();

    assert_eq!(report.listing_count, 2);
    assert_eq!(report.mean_condo_fee, Some(1250.0));
    assert_eq!(
        report.mean_price_by[ROOMS].get(&GroupKey::Int(3)),
        Some(1_200_000.0)
    );
    let cost = report.cost_per_area.table().unwrap();
    assert_eq!(cost.row_count(), 1);
    assert_eq!(cost.get_col(POOL).unwrap().get_i64(0), Some(1));

    let view = filter(
        &table,
        &ListingFilter::new()
            .district("Moema")
            .negotiation_type(NegotiationType::Sale),
    )
    .unwrap();
    let markers: Vec<_> = map_points(view.table())
        .unwrap()
        .into_iter()
        .map(|p| p.marker)
        .collect();
    assert_eq!(markers, vec![MarkerKind::Suite, MarkerKind::Pool]);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["negotiation_type"], "sale");
    assert_eq!(json["cost_per_area"]["status"], "computed");
}

#[test]
fn test_missing_columns_only_fail_when_used() {
    let table = load("Distrito,Preço\nA,100\n");
    assert!(filter(&table, &ListingFilter::new().district("A")).is_ok());
    assert!(matches!(
        filter(
            &table,
            &ListingFilter::new().negotiation_type(NegotiationType::Rent)
        ),
        Err(ProcessorError::MissingColumn(c)) if c == NEGOTIATION_TYPE
    ));
    assert_eq!(
        with_cost_per_area(&table).unwrap_err(),
        ValidationError::MissingColumn {
            column: SIZE.to_string()
        }
    );
}

#[test]
fn test_cache_shares_loaded_table() {
    let mut tmp = NamedTempFile::new().unwrap();
    write!(tmp, "{}", LISTINGS_CSV).unwrap();

    let cache = TableCache::new();
    let first = cache.get_or_load(tmp.path()).unwrap();
    let second = cache.get_or_load(tmp.path()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.row_count(), 6);
}
