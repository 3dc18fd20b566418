use rand::distributions::{Alphanumeric, DistString};
use rand::Rng;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
  /// Assigned by the backend on insert, 0 until then.
  pub id: i64,
  pub name: String,
  pub title: String,
  pub fax: String,
  pub web: String,
  pub age: i8,
  pub right: bool,
  pub counter: i64,
}

impl Record {
  pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
    let mut text = |min: usize, max: usize| {
      let len = rng.gen_range(min..=max);
      Alphanumeric.sample_string(&mut *rng, len)
    };

    let name = text(8, 24);
    let title = text(12, 32);
    let fax = text(8, 12);
    let web = format!("https://{}.example", text(6, 16).to_lowercase());

    return Self {
      id: 0,
      name,
      title,
      fax,
      web,
      age: rng.gen(),
      right: rng.gen(),
      counter: rng.gen(),
    };
  }

  pub fn with_id(mut self, id: i64) -> Self {
    self.id = id;
    return self;
  }

  /// Same content, freshly randomized. Keeps the id.
  pub fn mutated<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
    return Self::random(rng).with_id(self.id);
  }

  /// Reads a row shaped like `SELECT id, name, title, fax, web, age, "right", counter`.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    return Ok(Self {
      id: row.get(0)?,
      name: row.get(1)?,
      title: row.get(2)?,
      fax: row.get(3)?,
      web: row.get(4)?,
      age: row.get(5)?,
      right: row.get(6)?,
      counter: row.get(7)?,
    });
  }

  pub fn params(&self) -> [&dyn rusqlite::ToSql; crate::INSERT_FIELDS] {
    return [
      &self.name,
      &self.title,
      &self.fax,
      &self.web,
      &self.age,
      &self.right,
      &self.counter,
    ];
  }

  /// True if every field except the id matches.
  pub fn same_content(&self, other: &Record) -> bool {
    return Record { id: 0, ..self.clone() } == Record { id: 0, ..other.clone() };
  }
}
