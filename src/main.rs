fn main() {
    let result = mkproj::run();
    if let Err(e) = &result {
        mkproj::report_error(e);
    }
    std::process::exit(mkproj::exit_code(&result));
}
