fn main() -> anyhow::Result<()> {
    graphql_reshaper::main()
}
