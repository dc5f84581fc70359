use loadfleet::entry;
use loadfleet::error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
