fn main() -> anyhow::Result<()> {
    env_logger::init();
    tof_calib::cli::run_from_env()
}
