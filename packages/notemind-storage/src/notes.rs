use crate::{Result, db::Db, models::Note};

pub async fn fetch_note(db: &Db, note_id: &str) -> Result<Option<Note>> {
	let note = sqlx::query_as::<_, Note>(
		"\
SELECT note_id, title, content, created_at, updated_at
FROM notes
WHERE note_id = $1",
	)
	.bind(note_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(note)
}
