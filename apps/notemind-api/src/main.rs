use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = notemind_api::Args::parse();

	notemind_api::run(args).await
}
