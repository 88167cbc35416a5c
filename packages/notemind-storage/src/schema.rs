pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_notes.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_notes.sql")),
				"tables/002_chat_sessions.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_chat_sessions.sql")),
				"tables/003_chat_session_messages.sql" => out
					.push_str(include_str!("../../../sql/tables/003_chat_session_messages.sql")),
				"tables/004_chat_session_alarms.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_chat_session_alarms.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
