fn main() {
    laser_pipeline::cli::run();
}
