fn main() {
    crate_chess_engine::uci::run_uci_loop();
}
