mod datetime;
mod oid;
