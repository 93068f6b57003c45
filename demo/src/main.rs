use demo::DemoArgs;
use structopt::StructOpt;

pub fn logging_init() {
    #[cfg(not(debug_assertions))]
    let log_level = log::LevelFilter::Info;
    #[cfg(debug_assertions)]
    let log_level = log::LevelFilter::Debug;

    env_logger::Builder::from_default_env()
        .default_format_timestamp_nanos(true)
        .filter_module("cgi_api::backends::headless::gpu", log::LevelFilter::Info)
        .filter_module("cgi_api::backends::headless::command_buffer", log::LevelFilter::Info)
        .filter_module("cgi_framework", log::LevelFilter::Debug)
        .filter_level(log_level)
        .init();
}

fn main() {
    logging_init();

    let args = DemoArgs::from_args();
    match demo::run(&args) {
        Ok(stats) => {
            println!("frames rendered:     {}", stats.frame_count);
            println!("fence stalls:        {}", stats.fence_stalls);
            println!("command lists:       {}", stats.gpu.command_lists_executed);
            println!("draw calls:          {}", stats.gpu.draw_calls);
            println!("barriers:            {}", stats.gpu.barriers);
            println!("presents:            {}", stats.gpu.presents);
            println!("validation errors:   {}", stats.gpu.validation_errors);
            println!("cbv/srv/uav peak:    {}", stats.cbv_srv_uav_peak_load);
            println!("sampler peak:        {}", stats.sampler_peak_load);
        }
        Err(e) => {
            log::error!("demo failed: {}", e);
            std::process::exit(1);
        }
    }
}
