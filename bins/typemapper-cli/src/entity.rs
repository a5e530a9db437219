use serde::Serialize;
use typemapper::Mapped;

#[derive(Debug, Default, Mapped, Serialize)]
pub struct Record {
    #[db_field(name = "id")]
    pub id: i64,

    #[db_field(name = "created_at")]
    pub created_at: Option<String>,
}

#[derive(Debug, Default, Mapped, Serialize)]
pub struct Address {
    #[db_field(name = "street")]
    pub street: Option<String>,

    #[db_field(name = "city")]
    pub city: Option<String>,

    #[db_field(name = "zip")]
    pub zip: Option<String>,
}

/// Demo entity: an ancestor record, a few scalars and an embedded address.
#[derive(Debug, Default, Mapped, Serialize)]
pub struct Customer {
    #[parent]
    #[serde(flatten)]
    pub record: Record,

    #[db_field(name = "name")]
    #[accessor(set)]
    pub name: String,

    #[db_field(name = "email")]
    pub email: Option<String>,

    #[db_field(name = "age")]
    pub age: Option<u16>,

    #[db_field(name = "active")]
    pub active: bool,

    #[embed]
    pub address: Option<Address>,
}

impl Customer {
    pub fn set_name(&mut self, name: String) {
        self.name = name.trim().to_string();
    }
}
