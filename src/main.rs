fn main() -> Result<(), Box<dyn std::error::Error>> {
    senren::cli::main()
}
