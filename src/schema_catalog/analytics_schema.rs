//! Built-in analytics schema over the event warehouse.
//!
//! | logical table              | physical table             | relations                    |
//! |----------------------------|----------------------------|------------------------------|
//! | `events`                   | `events`                   | `pdi`, `poe`, `person`       |
//! | `persons`                  | `person`                   |                              |
//! | `person_distinct_ids`      | `person_distinct_id2`      | `person`                     |
//! | `session_recording_events` | `session_recording_events` | `pdi`, `person`              |
//! | `cohort_people`            | `cohortpeople`             | `person`                     |
//! | `person_static_cohort`     | `person_static_cohort`     | `person`                     |
//! | `groups`                   | `groups`                   |                              |

use std::sync::Arc;

use super::collapse::VersionedCollapse;
use super::database::Database;
use super::errors::SchemaError;
use super::field::FieldDescriptor;
use super::lazy_table::LazyTable;
use super::table::Table;

fn person_collapse(from_field: &str) -> LazyTable {
    LazyTable::new(from_field, "persons", Arc::new(VersionedCollapse::persons()))
}

fn distinct_id_collapse() -> LazyTable {
    LazyTable::new(
        "distinct_id",
        "person_distinct_ids",
        Arc::new(VersionedCollapse::distinct_ids()),
    )
}

fn persons() -> Result<Table, SchemaError> {
    Table::physical("persons", "person")
        .column(FieldDescriptor::string("id"))
        .column(FieldDescriptor::datetime("created_at"))
        .column(FieldDescriptor::integer("team_id"))
        .column(FieldDescriptor::json("properties"))
        .column(FieldDescriptor::boolean("is_identified"))
        .column(FieldDescriptor::boolean("is_deleted"))
        .column(FieldDescriptor::integer("version"))
        .exclude_from_splash("is_deleted")
        .exclude_from_splash("version")
        .build()
}

fn person_distinct_ids() -> Result<Table, SchemaError> {
    Table::physical("person_distinct_ids", "person_distinct_id2")
        .column(FieldDescriptor::integer("team_id"))
        .column(FieldDescriptor::string("distinct_id"))
        .column(FieldDescriptor::string("person_id"))
        .column(FieldDescriptor::boolean("is_deleted"))
        .column(FieldDescriptor::integer("version"))
        .lazy("person", person_collapse("person_id"))
        .exclude_from_splash("is_deleted")
        .exclude_from_splash("version")
        .build()
}

/// Person columns denormalised onto each event row at ingestion time
fn events_person_on_event() -> Result<Table, SchemaError> {
    Table::virtual_table("events_poe")
        .field("id", FieldDescriptor::string("person_id"))
        .field("created_at", FieldDescriptor::datetime("person_created_at"))
        .field("properties", FieldDescriptor::json("person_properties"))
        .build()
}

fn events() -> Result<Table, SchemaError> {
    Table::physical("events", "events")
        .column(FieldDescriptor::string("uuid"))
        .column(FieldDescriptor::string("event"))
        .column(FieldDescriptor::json("properties"))
        .column(FieldDescriptor::datetime("timestamp"))
        .column(FieldDescriptor::integer("team_id"))
        .column(FieldDescriptor::string("distinct_id"))
        .column(FieldDescriptor::string("elements_chain"))
        .column(FieldDescriptor::datetime("created_at"))
        .lazy("pdi", distinct_id_collapse())
        .table("poe", events_person_on_event()?)
        .traverser("person", &["pdi", "person"])
        .traverser("person_id", &["pdi", "person_id"])
        .build()
}

fn session_recording_events() -> Result<Table, SchemaError> {
    Table::physical("session_recording_events", "session_recording_events")
        .column(FieldDescriptor::string("uuid"))
        .column(FieldDescriptor::datetime("timestamp"))
        .column(FieldDescriptor::integer("team_id"))
        .column(FieldDescriptor::string("distinct_id"))
        .column(FieldDescriptor::string("session_id"))
        .column(FieldDescriptor::string("window_id"))
        .column(FieldDescriptor::json("snapshot_data"))
        .column(FieldDescriptor::json("events_summary").array())
        .column(FieldDescriptor::integer("click_count"))
        .column(FieldDescriptor::integer("keypress_count"))
        .column(FieldDescriptor::datetime("timestamps_summary").array())
        .column(FieldDescriptor::datetime("first_event_timestamp"))
        .column(FieldDescriptor::datetime("last_event_timestamp"))
        .column(FieldDescriptor::string("urls").array())
        .lazy("pdi", distinct_id_collapse())
        .traverser("person", &["pdi", "person"])
        .build()
}

/// Dynamic cohort membership
fn cohort_people() -> Result<Table, SchemaError> {
    Table::physical("cohort_people", "cohortpeople")
        .column(FieldDescriptor::string("person_id"))
        .column(FieldDescriptor::integer("cohort_id"))
        .column(FieldDescriptor::integer("team_id"))
        .column(FieldDescriptor::integer("sign"))
        .column(FieldDescriptor::integer("version"))
        .lazy("person", person_collapse("person_id"))
        .build()
}

/// Static cohort membership
fn person_static_cohort() -> Result<Table, SchemaError> {
    Table::physical("person_static_cohort", "person_static_cohort")
        .column(FieldDescriptor::string("id"))
        .column(FieldDescriptor::string("person_id"))
        .column(FieldDescriptor::integer("cohort_id"))
        .column(FieldDescriptor::integer("team_id"))
        .lazy("person", person_collapse("person_id"))
        .build()
}

fn groups() -> Result<Table, SchemaError> {
    Table::physical("groups", "groups")
        .column(FieldDescriptor::integer("group_type_index"))
        .column(FieldDescriptor::integer("team_id"))
        .column(FieldDescriptor::string("group_key"))
        .column(FieldDescriptor::datetime("created_at"))
        .column(FieldDescriptor::json("group_properties"))
        .build()
}

impl Database {
    /// The built-in analytics schema
    pub fn analytics() -> Result<Arc<Database>, SchemaError> {
        Database::builder()
            .add(events()?)
            .add(persons()?)
            .add(person_distinct_ids()?)
            .add(session_recording_events()?)
            .add(cohort_people()?)
            .add(person_static_cohort()?)
            .add(groups()?)
            .build()
    }
}
