fn main() {
    std::process::exit(mmnet_studio_lib::run());
}
