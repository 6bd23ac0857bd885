/// Google Places business type → GeoDirectory category (name, id).
pub const GOOGLE_TO_DIRECTORY_CATEGORY: [(&str, &str, u32); 21] = [
    ("Bangle Shop", "Jewellery Gifts", 106),
    ("Bead Store", "Handmade Jewellery", 102),
    ("Diamond Buyer", "Diamond Jewellery", 93),
    ("Diamond Dealer", "Diamond Jewellery", 93),
    ("Gemologist", "Jewellery Appraiser", 153),
    ("Goldsmith", "Custom Rings", 94),
    ("Jeweler", "Independent Jeweller", 99),
    ("Jewelry Appraiser", "Jewellery Appraiser", 153),
    ("Jewelry Buyer", "Pawnbroker", 108),
    ("Jewelry Designer", "Designer Jewellery", 105),
    ("Jewelry Engraver", "Jewellery Gifts", 106),
    ("Jewelry Equipment Supplier", "Jewellery Manufacturers", 140),
    ("Jewelry Exporter", "Jewellery Manufacturers", 140),
    ("Jewelry Manufacturer", "Jewellery Manufacturers", 140),
    ("Jewelry Repair Service", "Jewellery Repair", 152),
    ("Jewelry Store", "Independent Jeweller", 99),
    ("Silversmith", "Handmade Jewellery", 102),
    ("Watch Manufacturer", "Watches", 96),
    ("Watch Repair Service", "Jewellery Repair", 152),
    ("Watch Store", "Watches", 96),
    ("Wholesale Jeweler", "Jewellery Manufacturers", 140),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryCategory {
    pub name: &'static str,
    pub id: u32,
}

/// Exact lookup by display name, e.g. `"Jewelry Store"`.
pub fn lookup(google_type: &str) -> Option<DirectoryCategory> {
    GOOGLE_TO_DIRECTORY_CATEGORY
        .iter()
        .find(|(google, _, _)| *google == google_type)
        .map(|&(_, name, id)| DirectoryCategory { name, id })
}

/// `jewelry_store` → `Jewelry Store`
pub fn normalize_place_type(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// First Google type with a directory mapping wins.
pub fn category_for_types<S: AsRef<str>>(types: &[S]) -> Option<DirectoryCategory> {
    types
        .iter()
        .find_map(|t| lookup(t.as_ref()).or_else(|| lookup(&normalize_place_type(t.as_ref()))))
}

/// `",93,99,"` storage form for GeoDirectory.
pub fn format_post_category(ids: &[u32]) -> String {
    let joined = ids.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
    format!(",{},", joined)
}
