/**
 * Surge sweep over the vehicle link
 *
 * 1. Opens the serial port
 * 2. Sends a short sweep of surge commands, then neutral
 * 3. Prints every telemetry reading that comes back
 *
 * Usage: cargo run --example serial_sweep -- [port] [baud]
 */

use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use rov_console::telemetry::SensorBoard;
use rov_console::uart::{self, DEFAULT_BAUD};
use rov_console::ThrusterCommand;

fn main(){
    let _ = TermLogger::init(LevelFilter::Debug, Config::default(), TerminalMode::Mixed, ColorChoice::Auto);

    let args: Vec<String> = std::env::args().collect();
    let port = args.get(1).map(|s| s.as_str()).unwrap_or("/dev/ttyACM0");
    let baud: u32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_BAUD);

    let (link, mut reader) = match uart::open_serial(port, baud){
        Ok(pair) => pair,
        Err(e) =>{
            warn!("{}", e);
            info!("available ports: {:?}", uart::available_ports());
            return;
        }
    };

    let mut board = SensorBoard::new();
    let sweep = [1500, 1450, 1400, 1450, 1500, 1550, 1600, 1550, 1500];
    let start = Instant::now();

    for fwd in sweep{
        let cmd = ThrusterCommand::new([fwd, fwd, 1500, 1500, 1500, 1500]);
        match link.send_command(&cmd){
            Ok(()) => info!("[TX] {:?}", cmd.pwm),
            Err(e) => warn!("[TX] {}", e),
        }

        let step_end = Instant::now() + Duration::from_millis(500);
        while Instant::now() < step_end{
            match reader.poll_lines(){
                Ok(lines) =>{
                    for line in lines{
                        match board.update(&line){
                            Ok(r) => info!("[RX] pH={:.2} temp={:.2} pressure={:.2} level={}", r.ph, r.temperature, r.pressure, r.level),
                            Err(e) => warn!("[RX] {}", e),
                        }
                    }
                }
                Err(e) => warn!("[RX] read error: {}", e),
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    let _ = link.send_command(&ThrusterCommand::neutral());
    info!(
        "done in {:.1}s: {} readings accepted, {} rejected",
        start.elapsed().as_secs_f32(), board.accepted(), board.rejected()
    );
}
