fn main() -> anyhow::Result<()> {
    papernotes::cli::run()
}
