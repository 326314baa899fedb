fn main() -> anyhow::Result<()> {
    gxtract::cli::run_cli()
}
