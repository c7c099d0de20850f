pub mod csv_grid;
