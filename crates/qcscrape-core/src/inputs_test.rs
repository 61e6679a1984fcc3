use std::io::Write;

use super::*;

fn write_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn load_locations_reads_rows_in_order() {
    let file = write_file("latitude,longitude\n28.6139,77.2090\n19.0760, 72.8777\n");
    let locations = load_locations(file.path()).unwrap();
    assert_eq!(
        locations,
        vec![GeoPoint::new(28.6139, 77.209), GeoPoint::new(19.076, 72.8777)]
    );
}

#[test]
fn load_locations_drops_duplicates() {
    let file = write_file("latitude,longitude\n12.97,77.59\n12.97,77.59\n13.0,77.6\n");
    let locations = load_locations(file.path()).unwrap();
    assert_eq!(locations.len(), 2);
    assert_eq!(locations[0], GeoPoint::new(12.97, 77.59));
}

#[test]
fn load_locations_rejects_out_of_range_latitude() {
    let file = write_file("latitude,longitude\n128.6,77.2\n");
    let err = load_locations(file.path()).unwrap_err();
    assert!(
        matches!(err, ConfigError::Validation(ref msg) if msg.contains("latitude")),
        "got: {err:?}"
    );
}

#[test]
fn load_locations_rejects_non_numeric_values() {
    let file = write_file("latitude,longitude\nnorth,77.2\n");
    let err = load_locations(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InputFileParse { .. }), "got: {err:?}");
}

#[test]
fn load_locations_missing_file_is_io_error() {
    let err = load_locations(Path::new("/nonexistent/locations.csv")).unwrap_err();
    assert!(matches!(err, ConfigError::InputFileIo { .. }), "got: {err:?}");
}

#[test]
fn load_categories_reads_rows() {
    let file = write_file(
        "l1_category,l1_category_id,l2_category,l2_category_id\n\
         Munchies,1237,Bhujia Mixtures,1178\n\
         Dairy Bread Eggs,14,Milk,922\n",
    );
    let categories = load_categories(file.path()).unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].l2_category, "Bhujia Mixtures");
    assert_eq!(categories[1].l2_category_id, "922");
}

#[test]
fn load_categories_rejects_non_numeric_id() {
    let file = write_file(
        "l1_category,l1_category_id,l2_category,l2_category_id\nMunchies,abc,Chips,1178\n",
    );
    let err = load_categories(file.path()).unwrap_err();
    assert!(
        matches!(err, ConfigError::Validation(ref msg) if msg.contains("non-numeric")),
        "got: {err:?}"
    );
}

#[test]
fn load_categories_rejects_empty_name() {
    let file = write_file(
        "l1_category,l1_category_id,l2_category,l2_category_id\n,1237,Chips,1178\n",
    );
    let err = load_categories(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)), "got: {err:?}");
}

#[test]
fn load_categories_rejects_duplicates_differing_only_in_case() {
    let file = write_file(
        "l1_category,l1_category_id,l2_category,l2_category_id\n\
         Munchies,1237,Chips,1178\n\
         munchies,1237,CHIPS,1178\n",
    );
    let err = load_categories(file.path()).unwrap_err();
    assert!(
        matches!(err, ConfigError::Validation(ref msg) if msg.contains("duplicate")),
        "got: {err:?}"
    );
}
