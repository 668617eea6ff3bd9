fn main() -> std::process::ExitCode {
    anuncia_lib::run()
}
