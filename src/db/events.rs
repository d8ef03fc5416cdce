use rusqlite::{params, Connection, Row};

use crate::models::ActivityEvent;

pub fn insert_event(
    conn: &Connection,
    thread_id: &str,
    kind: &str,
    content: &str,
) -> anyhow::Result<ActivityEvent> {
    conn.execute(
        "INSERT INTO activity_events (thread_id, kind, content) VALUES (?1, ?2, ?3)",
        params![thread_id, kind, content],
    )?;
    let id = conn.last_insert_rowid();
    let event = conn.query_row(
        "SELECT id, thread_id, kind, content, created_at FROM activity_events WHERE id = ?1",
        params![id],
        event_from_row,
    )?;
    Ok(event)
}

pub fn get_thread_events(
    conn: &Connection,
    thread_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<ActivityEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, thread_id, kind, content, created_at
         FROM activity_events WHERE thread_id = ?1
         ORDER BY id DESC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![thread_id, limit], event_from_row)?;

    let mut events = vec![];
    for row in rows {
        events.push(row?);
    }
    events.reverse();
    Ok(events)
}

pub fn get_events_since(conn: &Connection, since_id: i64) -> anyhow::Result<Vec<ActivityEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, thread_id, kind, content, created_at
         FROM activity_events WHERE id > ?1
         ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![since_id], event_from_row)?;

    let mut events = vec![];
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityEvent> {
    Ok(ActivityEvent {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        kind: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}
