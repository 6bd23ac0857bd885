use crate::core::DirectoryStore;
use crate::domain::model::NewPostcode;
use crate::utils::error::{DataError, Result};
use crate::utils::validation::validate_coordinates;
use std::path::Path;

/// Parses `postcode,city,region,country,latitude,longitude` rows. Coordinates may be blank.
pub fn parse_postcodes(data: &[u8]) -> Result<Vec<NewPostcode>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<NewPostcode>().enumerate() {
        let row = record?;
        if row.postcode.is_empty() || row.country.is_empty() {
            return Err(DataError::validation(format!(
                "Row {}: postcode and country are required",
                index + 1
            )));
        }
        if let (Some(lat), Some(lng)) = (row.latitude, row.longitude) {
            validate_coordinates(lat, lng)?;
        }
        rows.push(row);
    }
    Ok(rows)
}

pub async fn import_postcodes_file(store: &dyn DirectoryStore, path: &Path) -> Result<usize> {
    tracing::info!("📥 Importing postcodes from {}", path.display());
    let data = tokio::fs::read(path).await?;
    let rows = parse_postcodes(&data)?;
    let imported = store.import_postcodes(rows).await?;
    tracing::info!("✅ Imported {} postcodes", imported);
    Ok(imported)
}
