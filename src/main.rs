fn main() {
    odaki_lib::run()
}
