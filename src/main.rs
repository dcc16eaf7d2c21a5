fn main() {
  cardlist_lib::run()
}
