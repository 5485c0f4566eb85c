//! Static catalog of the regions of Ukraine tracked for air raid alerts.
//!
//! The catalog is the single source of truth for which regions exist and in
//! which order they are reported. Every snapshot, diff, HTTP response and
//! notification batch follows [`CATALOG`] order.

/// A first-level administrative region of Ukraine.
#[derive(Debug, PartialEq, Eq)]
pub struct Region {
    /// Canonical lowercase identifier, e.g. `kyiv_city`.
    pub id: &'static str,
    /// Location uid used by the alerts.in.ua API.
    pub uid: &'static str,
    /// ISO 3166-2:UA code, used as element id on SVG maps.
    pub iso: &'static str,
    /// Ukrainian display name.
    pub name: &'static str,
    /// Transitions for this region get an emphasized notification.
    pub priority: bool,
}

/// How a source payload identifies regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKey {
    /// alerts.in.ua location uid (`"31"`)
    Uid,
    /// ISO 3166-2:UA code (`"UA-30"`)
    Iso,
}

const fn region(id: &'static str, uid: &'static str, iso: &'static str, name: &'static str) -> Region {
    Region {
        id,
        uid,
        iso,
        name,
        priority: false,
    }
}

/// All known regions, in the order of the alerts.in.ua "by oblast" status string.
pub static CATALOG: [Region; 27] = [
    region("crimea", "29", "UA-43", "Автономна Республіка Крим"),
    region("volyn", "8", "UA-07", "Волинська область"),
    region("vinnytsia", "4", "UA-05", "Вінницька область"),
    region("dnipropetrovsk", "9", "UA-12", "Дніпропетровська область"),
    region("donetsk", "28", "UA-14", "Донецька область"),
    region("zhytomyr", "10", "UA-18", "Житомирська область"),
    region("zakarpattia", "11", "UA-21", "Закарпатська область"),
    region("zaporizhzhia", "12", "UA-23", "Запорізька область"),
    region("ivano_frankivsk", "13", "UA-26", "Івано-Франківська область"),
    Region {
        id: "kyiv_city",
        uid: "31",
        iso: "UA-30",
        name: "м. Київ",
        priority: true,
    },
    region("kyiv", "14", "UA-32", "Київська область"),
    region("kirovohrad", "15", "UA-35", "Кіровоградська область"),
    region("luhansk", "16", "UA-09", "Луганська область"),
    region("lviv", "27", "UA-46", "Львівська область"),
    region("mykolaiv", "17", "UA-48", "Миколаївська область"),
    region("odesa", "18", "UA-51", "Одеська область"),
    region("poltava", "19", "UA-53", "Полтавська область"),
    region("rivne", "5", "UA-56", "Рівненська область"),
    region("sevastopol", "30", "UA-40", "м. Севастополь"),
    region("sumy", "20", "UA-59", "Сумська область"),
    region("ternopil", "21", "UA-61", "Тернопільська область"),
    region("kharkiv", "22", "UA-63", "Харківська область"),
    region("kherson", "23", "UA-65", "Херсонська область"),
    region("khmelnytskyi", "3", "UA-68", "Хмельницька область"),
    region("cherkasy", "24", "UA-71", "Черкаська область"),
    region("chernivtsi", "26", "UA-77", "Чернівецька область"),
    region("chernihiv", "25", "UA-74", "Чернігівська область"),
];

/// Finds a region by its canonical id.
pub fn by_id(id: &str) -> Option<&'static Region> {
    CATALOG.iter().find(|region| region.id == id)
}

/// Finds a region by the key a source payload uses for it.
///
/// # Examples
///
/// ```ignore
/// let region = catalog::find(RegionKey::Iso, "UA-30").unwrap();
/// assert_eq!(region.id, "kyiv_city");
/// ```
pub fn find(key: RegionKey, value: &str) -> Option<&'static Region> {
    CATALOG.iter().find(|region| match key {
        RegionKey::Uid => region.uid == value,
        RegionKey::Iso => region.iso.eq_ignore_ascii_case(value),
    })
}

/// Regions whose name or id contains `query`, ignoring case, in catalog order.
pub fn search(query: &str) -> Vec<&'static Region> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return vec![];
    }

    CATALOG
        .iter()
        .filter(|region| {
            region.name.to_lowercase().contains(&query) || region.id.contains(&query)
        })
        .collect()
}
