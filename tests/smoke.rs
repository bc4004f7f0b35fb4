use depot::{BackendResult, Changes, Depot, Entity, PutOutcome, RowLabeled, SelectQuery, Value};
use depot_memory::MemoryBackend;
use futures::StreamExt;

#[derive(Debug, Clone, PartialEq)]
struct Note {
    id: Option<i64>,
    text: String,
}

impl Entity for Note {
    fn table() -> &'static str {
        "notes"
    }

    fn identity(&self) -> Option<i64> {
        self.id
    }

    fn set_identity(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn to_row(&self) -> RowLabeled {
        RowLabeled::from_pairs([
            ("id", Value::Int64(self.id)),
            ("text", Value::from(self.text.clone())),
        ])
    }

    fn from_row(row: &RowLabeled) -> BackendResult<Self> {
        Ok(Self {
            id: row.get_column("id").and_then(Value::as_i64),
            text: row
                .get_column("text")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_default(),
        })
    }
}

#[tokio::test]
async fn facade_round_trip() {
    let depot = Depot::new(MemoryBackend::new());
    let mut observer = depot.observe_table("notes");

    let mut note = Note {
        id: None,
        text: "hello".to_owned(),
    };
    let outcome = depot
        .put()
        .object(&mut note)
        .prepare()
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(outcome, PutOutcome::Inserted { id: 1 });
    assert_eq!(observer.next().await.unwrap(), Changes::table("notes"));

    let notes = depot
        .get()
        .list_of::<Note>()
        .with_query(SelectQuery::builder().table("notes").build().unwrap())
        .prepare()
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(notes, [note]);
}
